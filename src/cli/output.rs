//! CLI output formatting

use crate::{
    core::{ExecutionPlan, ExecutionStatus, RunReport, StepOutcome},
    execution::ExecutionEvent,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the pipeline's steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

pub fn format_outcome(outcome: StepOutcome) -> String {
    match outcome {
        StepOutcome::Success => style("SUCCESS").green().to_string(),
        StepOutcome::Failed => style("FAILED").red().to_string(),
        StepOutcome::Skipped => style("SKIPPED").dim().to_string(),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 1 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Format an execution event for display
///
/// Returns `None` for events that only move the progress bar.
pub fn format_execution_event(event: &ExecutionEvent) -> Option<String> {
    let line = match event {
        ExecutionEvent::RunStarted {
            execution_id,
            pipeline_name,
            total_steps,
            wave_count,
        } => format!(
            "{} Starting pipeline {} ({}): {} steps in {} waves",
            ROCKET,
            style(pipeline_name).bold(),
            style(&execution_id.to_string()[..8]).dim(),
            total_steps,
            wave_count
        ),
        ExecutionEvent::WaveStarted { index, step_ids } => format!(
            "{} Wave {}: {}",
            INFO,
            index + 1,
            style(step_ids.join(", ")).dim()
        ),
        ExecutionEvent::StepStarted { step_id } => {
            format!("{} {}", SPINNER, style(step_id).cyan())
        }
        ExecutionEvent::StepSkipped { step_id, reason } => {
            format!("{} {} ({})", SKIP, style(step_id).dim(), reason)
        }
        ExecutionEvent::StepSucceeded { step_id, duration } => format!(
            "{} {} {}",
            CHECK,
            style(step_id).green(),
            style(format_duration(*duration)).dim()
        ),
        ExecutionEvent::StepFailed {
            step_id,
            error,
            stderr,
        } => {
            let mut line = format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim());
            if !stderr.trim().is_empty() {
                line.push('\n');
                line.push_str(&format_output(stderr.trim_end(), 20));
            }
            line
        }
        ExecutionEvent::WaveCompleted { .. } => return None,
        ExecutionEvent::RunInterrupted { remaining_steps } => format!(
            "{} Interrupted; skipping {} remaining step(s)",
            WARN, remaining_steps
        ),
        ExecutionEvent::RunCompleted { status, .. } => {
            format!("{} Pipeline {}", INFO, format_status(*status))
        }
    };
    Some(line)
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    let shown = if lines.len() <= max_lines {
        lines.join("\n    ")
    } else {
        format!(
            "{}\n    {}... ({} more lines)",
            lines[..max_lines].join("\n    "),
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    };
    format!("    {}", shown)
}

/// Per-step report lines plus the failure summary
pub fn format_report(report: &RunReport) -> String {
    let mut out = Vec::new();
    for result in &report.results {
        let mut line = format!(
            "  {:<24} {:<8} {}",
            result.step_id,
            format_outcome(result.outcome),
            style(format_duration(result.duration)).dim()
        );
        if let Some(detail) = &result.detail {
            line.push_str(&format!("  {}", style(detail).dim()));
        }
        out.push(line);
        if result.outcome == StepOutcome::Failed && !result.stderr.trim().is_empty() {
            out.push(format_output(result.stderr.trim_end(), 20));
        }
    }

    out.push(format!(
        "  {} succeeded, {} failed, {} skipped",
        style(report.succeeded_steps().len()).green(),
        style(report.failed_steps().len()).red(),
        style(report.skipped_steps().len()).dim()
    ));

    let failed = report.failed_steps();
    if !failed.is_empty() {
        let skipped: Vec<&str> = report
            .results
            .iter()
            .filter(|r| {
                r.outcome == StepOutcome::Skipped
                    && r.detail.as_deref().is_some_and(|d| d.starts_with("dependency"))
            })
            .map(|r| r.step_id.as_str())
            .collect();
        out.push(format!("{} Failed: {}", CROSS, style(failed.join(", ")).red()));
        if !skipped.is_empty() {
            out.push(format!(
                "{} Skipped because of failures: {}",
                SKIP,
                style(skipped.join(", ")).dim()
            ));
        }
    }

    out.join("\n")
}

/// Waves of an execution plan, one line per wave
pub fn format_plan(plan: &ExecutionPlan) -> String {
    plan.waves()
        .iter()
        .enumerate()
        .map(|(i, wave)| format!("  Wave {}: {}", i + 1, style(wave.join(", ")).cyan()))
        .collect::<Vec<_>>()
        .join("\n")
}
