use thiserror::Error;

/// Typed error hierarchy for the dashboard engine.
///
/// Library-internal errors use specific variants; application code wraps with
/// `anyhow::Context` for propagation.
#[derive(Error, Debug)]
pub enum AegisError {
    // -- Resolution ---------------------------------------------------------
    #[error("pool resolution failed: {reason}")]
    Resolution { reason: String },

    // -- Reads --------------------------------------------------------------
    #[error("{what} read failed: {reason}")]
    Read { what: &'static str, reason: String },

    // -- Validation ---------------------------------------------------------
    #[error("{0}")]
    InvalidInput(String),

    #[error("a transaction is already in flight")]
    Busy,

    // -- Execution ----------------------------------------------------------
    #[error("{message}")]
    WriteFailed { message: String },

    // -- Advisory -----------------------------------------------------------
    #[error("advisory unavailable: {reason}")]
    Advisory { reason: String },

    // -- Voice --------------------------------------------------------------
    #[error("voice input unavailable: no speech-to-text backend in this build, type `ask <scenario>` instead")]
    VoiceUnavailable,

    // -- Configuration ------------------------------------------------------
    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Alloy(#[from] alloy::transports::TransportError),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AegisError {
    /// Build a [`AegisError::Read`] from any displayable cause.
    pub fn read(what: &'static str, cause: impl std::fmt::Display) -> Self {
        Self::Read {
            what,
            reason: cause.to_string(),
        }
    }
}
