//! CLI errors

use std::path::PathBuf;

use thiserror::Error;

/// Everything a command can fail with
#[derive(Debug, Error)]
pub enum CliError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid board file: {0}")]
    BoardFile(#[from] toml::de::Error),

    #[error("invalid board description: {0}")]
    Board(String),

    #[error("flash error: {0}")]
    Flash(#[from] xipflash_core::Error),

    #[error(transparent)]
    Sim(#[from] xipflash_sim::SimError),

    #[error("progress bar template: {0}")]
    Template(#[from] indicatif::style::TemplateError),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("verification failed at 0x{0:08x}")]
    VerifyFailed(u32),
}

impl CliError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
