//! Subprocess plumbing shared by the recipes

use crate::recipe::{RecipeContext, RecipeError};
use std::ffi::OsStr;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run a program to completion without recording its output
///
/// The parent environment is inherited and the step environment applied on
/// top. `cwd` defaults to the context's working directory. On unix the child
/// gets its own process group, so terminal signals are left to the engine.
pub async fn output<I, S>(
    ctx: &RecipeContext,
    cwd: Option<&Path>,
    program: &str,
    args: I,
) -> Result<Output, RecipeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let dir = cwd.unwrap_or(&ctx.working_dir);
    debug!("Spawning '{}' in {}", program, dir.display());

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(dir)
        .envs(ctx.env.iter())
        .kill_on_drop(true);
    // Own process group: a terminal Ctrl-C reaches the engine, not the step
    #[cfg(unix)]
    command.process_group(0);

    command
        .output()
        .await
        .map_err(|e| RecipeError::ProcessSpawnFailed {
            program: program.to_string(),
            reason: e.to_string(),
        })
}

/// Run a program, record its output in the context and require exit 0
pub async fn run<I, S>(
    ctx: &mut RecipeContext,
    cwd: Option<&Path>,
    program: &str,
    args: I,
) -> Result<(), RecipeError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let out = output(ctx, cwd, program, args).await?;
    ctx.output.record(&out);

    if !out.status.success() {
        // Signal termination has no code
        let exit_code = out.status.code().unwrap_or(-1);
        warn!("'{}' exited with code {}", program, exit_code);
        return Err(RecipeError::ProcessExitNonZero(exit_code));
    }

    debug!("'{}' produced {} bytes of output", program, out.stdout.len());
    Ok(())
}
