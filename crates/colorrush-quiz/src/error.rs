//! Error types for the quiz layer.

/// Errors returned by [`QuizEngine`](crate::QuizEngine) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizError {
    /// The submitted answer is not one of the palette colors.
    #[error("invalid color: {0:?}")]
    InvalidColor(String),

    /// Every challenge has already been answered.
    #[error("quiz already finished")]
    AlreadyFinished,

    /// There is no challenge at the cursor position.
    #[error("no active challenge")]
    NotStarted,
}

impl QuizError {
    /// Stable code sent to clients in `error` messages.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidColor(_) => "INVALID_COLOR",
            Self::AlreadyFinished => "ALREADY_FINISHED",
            Self::NotStarted => "NOT_STARTED",
        }
    }
}
