use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::sync::atomic::Ordering;
use stepforge::cli::commands::{GenerateCommand, RunCommand, ValidateCommand};
use stepforge::cli::output::*;
use stepforge::cli::{Cli, Command};
use stepforge::core::config::PipelineConfig;
use stepforge::recipe::DEFAULT_HANDLER_PREFIX;
use stepforge::{
    CompiledPipeline, CustomRegistry, Environment, ExecutionEngine, ExecutionEvent,
};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins unless --verbose is given
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::Generate(cmd) => generate_program(cmd)?,
    }

    Ok(())
}

fn load(file: &std::path::Path, overrides: &[(String, String)]) -> Result<CompiledPipeline> {
    let config = PipelineConfig::from_file(file).context("Failed to load pipeline config")?;
    let mut pipeline = config.to_pipeline();

    if !overrides.is_empty() {
        let vars: Environment = overrides.iter().cloned().collect();
        pipeline.env = pipeline.env.merged_with(&vars);
    }

    CompiledPipeline::compile(pipeline)
        .with_context(|| format!("Pipeline '{}' is invalid", config.name))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    let compiled = match load(&cmd.file, &cmd.var) {
        Ok(compiled) => compiled,
        Err(e) => {
            println!("{} {}", CROSS, style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    let config = cmd.recipe_config();
    let registry = CustomRegistry::new().with_executable_fallback(DEFAULT_HANDLER_PREFIX);
    let strategy = cmd.scheduling_strategy();

    let progress = if cmd.json {
        ProgressBar::hidden()
    } else {
        create_progress_bar(compiled.plan().step_count())
    };

    let quiet = cmd.json;
    let bar = progress.clone();
    let engine = ExecutionEngine::with_registry(config, strategy, registry).with_event_handler(
        move |event| {
            match &event {
                ExecutionEvent::StepStarted { step_id } => bar.set_message(step_id.clone()),
                ExecutionEvent::StepSkipped { .. }
                | ExecutionEvent::StepSucceeded { .. }
                | ExecutionEvent::StepFailed { .. } => bar.inc(1),
                _ => {}
            }
            if quiet {
                return;
            }
            if let Some(line) = format_execution_event(&event) {
                bar.println(line);
            }
        },
    );

    // Stop between waves on Ctrl-C; running steps finish
    let interrupted = engine.interrupt_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current wave");
            interrupted.store(true, Ordering::SeqCst);
        }
    });

    let report = engine.execute(&compiled).await;
    progress.finish_and_clear();

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_report(&report));
        let elapsed = report.elapsed().map(format_duration).unwrap_or_default();
        if report.is_success() {
            println!(
                "\n{} {} {} {}",
                CHECK,
                style(&report.pipeline_name).bold(),
                format_status(report.status),
                style(elapsed).dim()
            );
        } else {
            println!(
                "\n{} {} {} {}",
                CROSS,
                style(&report.pipeline_name).bold(),
                format_status(report.status),
                style(elapsed).dim()
            );
            error!("{} step(s) failed", report.failed_steps().len());
        }
    }

    std::process::exit(report.exit_code());
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    match load(&cmd.file, &[]) {
        Ok(compiled) => {
            let pipeline = compiled.pipeline();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&pipeline.name).bold());
            println!("  Steps: {}", style(pipeline.steps.len()).cyan());
            println!("  Variables: {}", style(pipeline.env.len()).cyan());
            println!("{}", format_plan(compiled.plan()));

            if cmd.json {
                let json = serde_json::to_string_pretty(compiled.plan())?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

fn generate_program(cmd: &GenerateCommand) -> Result<()> {
    let mut stdout = std::io::stdout();
    match stepforge::run_generation(&cmd.file, &cmd.out, &mut stdout) {
        Ok(program) => {
            println!(
                "{} Build it with: cargo build --release --manifest-path {}",
                CHECK,
                style(cmd.out.join("Cargo.toml").display()).cyan()
            );
            tracing::debug!("Wrote {} file(s)", program.files.len());
            Ok(())
        }
        Err(e) => {
            println!("{} Generation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}
