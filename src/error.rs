/// Fatal errors. Each one ends the process with a one-line diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Error: {0}")]
    Config(String),

    #[error("Error sending email: {0}")]
    Transport(String),

    #[error("Error receiving email: {0}")]
    Retrieval(String),

    #[error("Error writing output: {0}")]
    Output(#[from] std::io::Error),
}

impl MailError {
    pub fn transport(e: anyhow::Error) -> Self {
        MailError::Transport(format!("{e:#}"))
    }

    pub fn retrieval(e: anyhow::Error) -> Self {
        MailError::Retrieval(format!("{e:#}"))
    }

    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T> = std::result::Result<T, MailError>;
