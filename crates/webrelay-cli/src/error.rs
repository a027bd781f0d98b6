use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] webrelay_core::ClientError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Client(error) => match error {
                webrelay_core::ClientError::Validation(_) => 2,
                webrelay_core::ClientError::AuthScope { .. } => 3,
                webrelay_core::ClientError::NoDevice(_)
                | webrelay_core::ClientError::LocalSessionNotHonored(_) => 6,
                webrelay_core::ClientError::Transport(_) => 7,
                webrelay_core::ClientError::Stream(_) => 8,
            },
            Self::Command(_) => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
