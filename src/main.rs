//! satchel - pulls and packs docker images between private registries.
//!
//! This binary parses flags, runs the pack pipeline and reports fatal errors
//! with recovery suggestions.

use satchel::cli;
use satchel::cli::OutputManager;
use std::process;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            let output = OutputManager::new();
            output.error(&format!("Fatal error: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.error_detail("");
                output.error_detail("Recovery suggestions:");
                for suggestion in suggestions {
                    output.error_detail(&format!("• {}", suggestion));
                }
            }

            process::exit(1);
        }
    }
}
