use std::io;

use embraceu_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] embraceu_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Remote is not configured. Run `embraceu config init` or set EMBRACEU_SUPABASE_URL and EMBRACEU_SUPABASE_ANON_KEY."
    )]
    RemoteNotConfigured,
}
