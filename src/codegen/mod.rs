//! Code generation: compile a pipeline into a standalone Rust program
//!
//! The output is a std-only crate (`Cargo.toml` and `src/main.rs`) that runs
//! the same waves with the same skip rules as [`crate::execution`]. Every
//! user-supplied string goes through [`escape::quote`].

pub mod escape;
pub mod templates;

use crate::core::{
    condition::{CompareOp, Condition, Operand},
    config::PipelineConfig,
    Action, CacheOperation, CompiledPipeline, Step, StepOutcome,
};
use crate::recipe::{cache::split_paths, RecipeConfig, DEFAULT_HANDLER_PREFIX};
use anyhow::Context;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("template '{name}': {detail}")]
    TemplateMissing { name: String, detail: String },

    #[error("cannot escape {context}: {reason}")]
    EscapingFailure { context: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailure { path: String, reason: String },
}

fn write_failure(path: &Path, err: impl std::fmt::Display) -> CodegenError {
    CodegenError::WriteFailure {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

/// One output file, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedProgram {
    pub package_name: String,
    pub files: Vec<GeneratedFile>,
}

impl GeneratedProgram {
    pub fn file(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files
            .iter()
            .find(|f| f.path == path.as_ref())
            .map(|f| f.contents.as_str())
    }

    pub fn main_rs(&self) -> Option<&str> {
        self.file("src/main.rs")
    }

    pub fn cargo_toml(&self) -> Option<&str> {
        self.file("Cargo.toml")
    }

    /// Write all files under `dir`
    ///
    /// Files are staged in a sibling directory first. A new `dir` is created
    /// by renaming the staging directory; an existing one has its files
    /// replaced one by one, restoring the previous contents if any
    /// replacement fails. The staging directory is always removed.
    pub fn write_to(&self, dir: &Path) -> Result<(), CodegenError> {
        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "generated".to_string());

        fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
        let staging = parent.join(format!(".{}.staging-{}", name, Uuid::new_v4()));
        debug!("Staging generated files in {}", staging.display());

        let result = self.stage(&staging).and_then(|()| {
            if dir.exists() {
                self.replace_into(&staging, dir)
            } else {
                fs::rename(&staging, dir).map_err(|e| write_failure(dir, e))
            }
        });
        // Best effort; gone already when the whole directory was renamed
        let _ = fs::remove_dir_all(&staging);
        result
    }

    fn stage(&self, staging: &Path) -> Result<(), CodegenError> {
        for file in &self.files {
            let path = staging.join(&file.path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
            }
            fs::write(&path, &file.contents).map_err(|e| write_failure(&path, e))?;
        }
        Ok(())
    }

    fn replace_into(&self, staging: &Path, dir: &Path) -> Result<(), CodegenError> {
        let backups = staging.join(BACKUP_DIR);
        let mut replaced: Vec<(PathBuf, Option<PathBuf>)> = Vec::new();

        for file in &self.files {
            let target = dir.join(&file.path);
            match replace_file(&staging.join(&file.path), &target, &backups.join(&file.path)) {
                Ok(backup) => replaced.push((target, backup)),
                Err(e) => {
                    warn!("Restoring {} after failed write", dir.display());
                    for (target, backup) in replaced.iter().rev() {
                        let _ = fs::remove_file(target);
                        if let Some(backup) = backup {
                            let _ = fs::rename(backup, target);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Previous contents of replaced files, kept inside the staging directory
const BACKUP_DIR: &str = ".previous";

/// Move `staged` to `target`, parking any existing file at `backup`
fn replace_file(staged: &Path, target: &Path, backup: &Path) -> Result<Option<PathBuf>, CodegenError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
    }

    let parked = if target.is_file() {
        if let Some(parent) = backup.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failure(parent, e))?;
        }
        fs::rename(target, backup).map_err(|e| write_failure(target, e))?;
        Some(backup.to_path_buf())
    } else {
        None
    };

    if let Err(e) = fs::rename(staged, target) {
        if let Some(backup) = &parked {
            let _ = fs::rename(backup, target);
        }
        return Err(write_failure(target, e));
    }
    Ok(parked)
}

/// Cargo package name derived from a pipeline name
pub fn package_name(pipeline_name: &str) -> String {
    let mut name = String::new();
    for c in pipeline_name.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_lowercase());
        } else if !name.ends_with('-') {
            name.push('-');
        }
    }
    let name = name.trim_matches('-');
    match name.chars().next() {
        None => "pipeline".to_string(),
        Some(c) if c.is_ascii_digit() => format!("pipeline-{}", name),
        Some(_) => name.to_string(),
    }
}

/// Generate the program for a validated pipeline
///
/// Pure and deterministic: the same pipeline always yields identical bytes.
pub fn generate(compiled: &CompiledPipeline) -> Result<GeneratedProgram, CodegenError> {
    let pipeline = compiled.pipeline();
    let steps: Vec<&Step> = compiled
        .plan()
        .step_ids()
        .filter_map(|id| pipeline.step(id))
        .collect();
    let index: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| (step.id.as_str(), i))
        .collect();

    let mut step_entries = Vec::with_capacity(steps.len());
    let mut dependents = Vec::with_capacity(steps.len());
    let mut conditions = Vec::new();
    for (i, step) in steps.iter().enumerate() {
        step_entries.push(render_step(i, step, pipeline.env_for_step(step).iter())?);

        let mut targets: Vec<usize> = compiled
            .graph()
            .transitive_dependents(&step.id)
            .into_iter()
            .filter_map(|id| index.get(id).copied())
            .collect();
        targets.sort_unstable();
        dependents.push(format!("    &{:?},", targets));

        if let Some(condition) = compiled.condition(&step.id) {
            let expr = compile_condition(&step.id, condition, &index)?;
            conditions.push(format!("        {} => {},", i, expr));
        }
    }

    let waves: Vec<String> = compiled
        .plan()
        .waves()
        .iter()
        .map(|wave| {
            let ids: Vec<usize> = wave.iter().filter_map(|id| index.get(id.as_str()).copied()).collect();
            format!("    &{:?},", ids)
        })
        .collect();

    let package = package_name(&pipeline.name);
    let mut values: BTreeMap<&str, String> = BTreeMap::new();
    values.insert("pipeline_comment", escape::comment(&pipeline.name));
    values.insert("pipeline_name", escape::quote("name", &pipeline.name)?);
    values.insert(
        "default_toolchain",
        escape::quote("toolchain", &RecipeConfig::default().toolchain)?,
    );
    values.insert("handler_prefix", escape::quote("handler prefix", DEFAULT_HANDLER_PREFIX)?);
    values.insert("app_name", escape::quote("app name", env!("CARGO_PKG_NAME"))?);
    values.insert("steps", step_entries.join("\n"));
    values.insert("waves", waves.join("\n"));
    values.insert("dependents", dependents.join("\n"));
    values.insert("conditions", conditions.join("\n"));
    values.insert("package_name", package.clone());

    let cargo_toml = templates::render_fragment(templates::CARGO_TOML, &values)?;
    let main_rs = templates::render_fragment(templates::MAIN_RS, &values)?;

    debug!(
        "Generated program '{}' for {} steps ({} bytes)",
        package,
        steps.len(),
        main_rs.len()
    );

    Ok(GeneratedProgram {
        package_name: package,
        files: vec![
            GeneratedFile {
                path: PathBuf::from("Cargo.toml"),
                contents: cargo_toml,
            },
            GeneratedFile {
                path: PathBuf::from("src").join("main.rs"),
                contents: main_rs,
            },
        ],
    })
}

fn render_step<'a>(
    index: usize,
    step: &Step,
    env: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<String, CodegenError> {
    let field = |name: &str| format!("steps.{}.{}", step.id, name);

    let mut pairs = Vec::new();
    for (key, value) in env {
        pairs.push(format!(
            "({}, {})",
            escape::quote(&field("env"), key)?,
            escape::quote(&field(&format!("env.{}", key)), value)?
        ));
    }

    Ok(format!(
        "    // {}: {}\n    Step {{\n        id: {},\n        name: {},\n        env: &[{}],\n        action: {},\n    }},",
        index,
        escape::comment(&step.name),
        escape::quote(&field("id"), &step.id)?,
        escape::quote(&field("name"), &step.name)?,
        pairs.join(", "),
        render_action(&step.id, &step.action)?
    ))
}

fn render_action(step_id: &str, action: &Action) -> Result<String, CodegenError> {
    let q = |name: &str, value: &str| escape::quote(&format!("steps.{}.{}", step_id, name), value);
    let q_opt = |name: &str, value: Option<&str>| {
        escape::quote_option(&format!("steps.{}.{}", step_id, name), value)
    };

    let rendered = match action {
        Action::Shell {
            command,
            working_dir,
        } => format!(
            "Action::Shell {{ command: {}, working_dir: {} }}",
            q("command", command)?,
            q_opt("working_dir", working_dir.as_deref())?
        ),
        Action::Compile {
            source_file,
            output_name,
            optimize,
        } => format!(
            "Action::Compile {{ source_file: {}, output_name: {}, optimize: {} }}",
            q("source_file", source_file)?,
            q("output_name", output_name)?,
            q("optimize", optimize.as_str())?
        ),
        Action::TestRun { test_file, filter } => format!(
            "Action::TestRun {{ test_file: {}, filter: {} }}",
            q("test_file", test_file)?,
            q_opt("filter", filter.as_deref())?
        ),
        Action::Checkout {
            repository,
            branch,
            path,
        } => format!(
            "Action::Checkout {{ repository: {}, branch: {}, path: {} }}",
            q("repository", repository)?,
            q("branch", branch)?,
            q("path", path)?
        ),
        Action::Artifact {
            source_path,
            destination,
        } => format!(
            "Action::Artifact {{ source_path: {}, destination: {} }}",
            q("source_path", source_path)?,
            q("destination", destination)?
        ),
        Action::Cache {
            action: CacheOperation::Save,
            key,
            paths,
            cache_dir,
        } => {
            let quoted = split_paths(paths)
                .iter()
                .map(|p| q("paths", p))
                .collect::<Result<Vec<_>, _>>()?;
            format!(
                "Action::CacheSave {{ key: {}, paths: &[{}], cache_dir: {} }}",
                q("key", key)?,
                quoted.join(", "),
                q_opt("cache_dir", cache_dir.as_deref())?
            )
        }
        Action::Cache {
            action: CacheOperation::Restore,
            key,
            cache_dir,
            ..
        } => format!(
            "Action::CacheRestore {{ key: {}, cache_dir: {} }}",
            q("key", key)?,
            q_opt("cache_dir", cache_dir.as_deref())?
        ),
        Action::Custom {
            type_name,
            parameters,
        } => {
            let pairs = parameters
                .iter()
                .map(|(k, v)| {
                    Ok(format!(
                        "({}, {})",
                        q("parameters", k)?,
                        q(&format!("parameters.{}", k), v)?
                    ))
                })
                .collect::<Result<Vec<_>, CodegenError>>()?;
            format!(
                "Action::Custom {{ type_name: {}, parameters: &[{}] }}",
                q("type_name", type_name)?,
                pairs.join(", ")
            )
        }
    };
    Ok(rendered)
}

/// Translate a condition into a Rust boolean expression over `env` and `outcomes`
fn compile_condition(
    step_id: &str,
    condition: &Condition,
    index: &HashMap<&str, usize>,
) -> Result<String, CodegenError> {
    let context = format!("steps.{}.condition", step_id);
    let operand = |operand: &Operand| match operand {
        Operand::Env(name) => Ok(format!("env_get(env, {})", escape::quote(&context, name)?)),
        Operand::Literal(value) => escape::quote(&context, value),
    };

    Ok(match condition {
        Condition::Bool(b) => b.to_string(),
        Condition::Truthy(Operand::Env(name)) => {
            format!("truthy(env_get(env, {}))", escape::quote(&context, name)?)
        }
        Condition::Truthy(Operand::Literal(value)) => (!value.is_empty()).to_string(),
        Condition::Compare { left, op, right } => {
            let op = match op {
                CompareOp::Eq => "==",
                CompareOp::Ne => "!=",
            };
            format!("({} {} {})", operand(left)?, op, operand(right)?)
        }
        Condition::StepIs {
            step_id: target,
            outcome,
        } => match index.get(target.as_str()) {
            Some(i) => {
                let variant = match outcome {
                    StepOutcome::Success => "Success",
                    StepOutcome::Failed => "Failed",
                    StepOutcome::Skipped => "Skipped",
                };
                format!("(outcomes[{}] == Some(Outcome::{}))", i, variant)
            }
            // Never recorded, matches no outcome
            None => "false".to_string(),
        },
        Condition::Not(inner) => format!("!{}", wrap(compile_condition(step_id, inner, index)?)),
        Condition::And(a, b) => format!(
            "({} && {})",
            compile_condition(step_id, a, index)?,
            compile_condition(step_id, b, index)?
        ),
        Condition::Or(a, b) => format!(
            "({} || {})",
            compile_condition(step_id, a, index)?,
            compile_condition(step_id, b, index)?
        ),
    })
}

fn wrap(expr: String) -> String {
    if expr.starts_with('(') && expr.ends_with(')') {
        expr
    } else {
        format!("({})", expr)
    }
}

/// Parse, validate and generate in one go, reporting each phase to `sink`
pub fn run_generation<W: Write>(
    path: &Path,
    out_dir: &Path,
    sink: &mut W,
) -> anyhow::Result<GeneratedProgram> {
    writeln!(sink, "[1/3] Parsing {}", path.display())?;
    let config = PipelineConfig::from_file(path)?;

    writeln!(
        sink,
        "[2/3] Validating pipeline '{}' ({} steps)",
        config.name,
        config.steps.len()
    )?;
    let compiled = CompiledPipeline::compile(config.to_pipeline())
        .with_context(|| format!("Pipeline '{}' is invalid", config.name))?;

    writeln!(sink, "[3/3] Generating program into {}", out_dir.display())?;
    let program = generate(&compiled)?;
    program.write_to(out_dir)?;

    info!(
        "Generated {} file(s) for pipeline '{}' in {}",
        program.files.len(),
        config.name,
        out_dir.display()
    );
    writeln!(sink, "Generated package '{}'", program.package_name)?;
    Ok(program)
}
