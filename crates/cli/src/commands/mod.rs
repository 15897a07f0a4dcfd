//! Subcommand implementations.

pub mod cache;
pub mod normalize;
pub mod run;

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tillpoint_checkout::CheckoutError;

/// Errors specific to CLI input handling.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Action #{index} ({name}) was rejected: {source}")]
    ActionRejected {
        index: usize,
        name: &'static str,
        #[source]
        source: CheckoutError,
    },
}

/// Read and parse a YAML file.
pub async fn read_yaml<T: DeserializeOwned>(
    path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(CommandError::FileNotFound(path.to_path_buf()).into());
    }
    let content = tokio::fs::read_to_string(path).await?;
    serde_yaml::from_str(&content).map_err(|source| {
        CommandError::Yaml {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

/// Write a value to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
