//! Command line interface for satchel.
//!
//! Parses flags into a [`SatchelConfig`](crate::SatchelConfig), runs the
//! pipeline against the docker CLI and reports the result.

mod args;
mod output;

pub use args::Args;
pub use output::OutputManager;

use crate::SatchelConfig;
use crate::error::{CliError, Result};
use crate::pipeline;

/// Exit code for a successful run
pub const EXIT_SUCCESS: i32 = 0;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    execute(Args::parse_args()).await
}

/// Run satchel for already parsed arguments
pub async fn execute(args: Args) -> Result<i32> {
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = SatchelConfig::from(&args);
    let daemon = args.docker_cli();
    let summary = pipeline::run(&config, &daemon).await?;

    let output = OutputManager::default();
    let _ = output.success(&format!(
        "Packed {} image(s) into {} ({} bytes)",
        summary.images_archived,
        summary.archive_path.display(),
        summary.archive_size
    ));
    let _ = output.indent(&format!(
        "Load script: {} ({} image(s))",
        summary.script_path.display(),
        summary.images_scripted
    ));
    let _ = output.indent(&format!(
        "At the destination run: ./{} <registry>",
        summary
            .script_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| summary.script_path.display().to_string())
    ));

    Ok(EXIT_SUCCESS)
}
