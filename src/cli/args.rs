//! Command line argument parsing and validation.
//!
//! Flags keep their historical single-dash spelling (`-in`, `-out`,
//! `-public`); the double-dash forms work as well.

use crate::daemon::{DOCKER_PROGRAM, DockerCli};
use crate::script::LOAD_SCRIPT_NAME;
use crate::{DEFAULT_ARCHIVE, DEFAULT_MANIFEST, SatchelConfig};
use clap::{ArgAction, CommandFactory, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

/// Pulls and packs docker images between private registries
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(
    name = "satchel",
    version,
    about = "satchel pulls and packs docker images between private registries",
    long_about = "satchel pulls and packs docker images between private registries.

Images listed in the manifest are pulled, retagged without their registry and
exported into one compressed archive. A load-images.sh script is written next
to it; run it at the destination with the target registry as its argument.

Usage:
  satchel -in satchel.toml -out satchel-images.tgz
  ./load-images.sh registry.internal:5000"
)]
pub struct Args {
    /// Input TOML manifest to use
    #[arg(long = "in", value_name = "PATH", env = "SATCHEL_MANIFEST", default_value = DEFAULT_MANIFEST)]
    pub input: PathBuf,

    /// Name of archive file to generate
    #[arg(long = "out", value_name = "PATH", env = "SATCHEL_OUTPUT", default_value = DEFAULT_ARCHIVE)]
    pub output: PathBuf,

    /// Include public images in the archive
    #[arg(long)]
    pub public: bool,

    /// Reject invalid manifest entries and fail when an image is missing locally
    #[arg(long)]
    pub strict: bool,

    /// Path of the generated load script
    #[arg(long, value_name = "PATH", default_value = LOAD_SCRIPT_NAME)]
    pub script: PathBuf,

    /// docker CLI used to reach the daemon
    #[arg(long, value_name = "PROGRAM", env = "SATCHEL_DOCKER", default_value = DOCKER_PROGRAM)]
    pub docker: String,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_flags(std::env::args_os()))
    }

    /// Parse from an explicit argument list (first item is the program name)
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_flags(args))
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.input.as_os_str().is_empty() {
            return Err("Input manifest path must not be empty".to_string());
        }
        if self.output.as_os_str().is_empty() {
            return Err("Output archive path must not be empty".to_string());
        }
        if self.script.as_os_str().is_empty() {
            return Err("Load script path must not be empty".to_string());
        }
        if self.script == self.output {
            return Err(format!(
                "Load script and archive cannot both be written to {}",
                self.output.display()
            ));
        }
        if self.docker.trim().is_empty() {
            return Err("docker program must not be empty".to_string());
        }

        Ok(())
    }

    /// Daemon client for the configured docker program
    pub fn docker_cli(&self) -> DockerCli {
        DockerCli::new(self.docker.clone())
    }
}

impl From<&Args> for SatchelConfig {
    fn from(args: &Args) -> Self {
        Self {
            manifest_path: args.input.clone(),
            archive_path: args.output.clone(),
            script_path: args.script.clone(),
            include_public: args.public,
            strict: args.strict,
        }
    }
}

/// Rewrite single-dash long flags (`-in x`, `-out=y`) to their double-dash
/// form. Only names of known long flags are rewritten, and nothing after a
/// bare `--`.
///
/// Switches also take an explicit boolean (`-public=false`), spelled any way
/// Go's `strconv.ParseBool` accepts; `true` becomes the bare switch and
/// `false` drops it.
fn normalize_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let command = Args::command();
    let mut long_names: Vec<&str> = command
        .get_arguments()
        .filter_map(|arg| arg.get_long())
        .collect();
    long_names.extend(["help", "version"]);
    let switches: Vec<&str> = command
        .get_arguments()
        .filter(|arg| matches!(arg.get_action(), ArgAction::SetTrue))
        .filter_map(|arg| arg.get_long())
        .collect();

    let mut normalized = Vec::new();
    let mut passthrough = false;

    for (index, arg) in args.into_iter().map(Into::into).enumerate() {
        if index == 0 || passthrough {
            normalized.push(arg);
            continue;
        }
        let Some(text) = arg.to_str() else {
            normalized.push(arg);
            continue;
        };
        if text == "--" {
            passthrough = true;
            normalized.push(arg);
            continue;
        }

        let Some(name) = text
            .strip_prefix("--")
            .or_else(|| text.strip_prefix('-'))
        else {
            normalized.push(arg.clone());
            continue;
        };
        let (flag, value) = match name.split_once('=') {
            Some((flag, value)) => (flag, Some(value)),
            None => (name, None),
        };
        if !long_names.contains(&flag) {
            normalized.push(arg.clone());
            continue;
        }

        match value.filter(|_| switches.contains(&flag)).map(parse_bool) {
            Some(Some(true)) => normalized.push(OsString::from(format!("--{flag}"))),
            Some(Some(false)) => {}
            _ => normalized.push(OsString::from(format!("--{name}"))),
        }
    }

    normalized
}

/// Boolean spellings accepted by Go's `strconv.ParseBool`
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
