/// Convenience result type used across flipbook.
pub type FlipbookResult<T> = Result<T, FlipbookError>;

/// Top-level error taxonomy used by animation and writer APIs.
#[derive(thiserror::Error, Debug)]
pub enum FlipbookError {
    /// Invalid writer or animation configuration (frame format, playback mode, output extension).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested encoder executable is missing or failed its capability probe.
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),

    /// An external encoder process exited with a non-zero status.
    #[error("encoding process failed: {0}")]
    EncodingProcess(Box<ProcessFailure>),

    /// A writer session or animation was driven out of order.
    #[error("state error: {0}")]
    State(String),

    /// A frame drawer broke its contract.
    #[error("animation error: {0}")]
    Animation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlipbookError {
    /// Build a [`FlipbookError::Configuration`] value.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a [`FlipbookError::EncoderUnavailable`] value.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::EncoderUnavailable(msg.into())
    }

    /// Build a [`FlipbookError::State`] value.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Build a [`FlipbookError::Animation`] value.
    pub fn animation(msg: impl Into<String>) -> Self {
        Self::Animation(msg.into())
    }

    /// Return the captured process failure, if this is an encoding failure.
    pub fn process_failure(&self) -> Option<&ProcessFailure> {
        match self {
            Self::EncodingProcess(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Captured outcome of an encoder process that exited unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    /// Program that was executed.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl std::fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "'{}' exited with status {code}", self.program)?,
            None => write!(f, "'{}' was terminated by a signal", self.program)?,
        }
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            write!(f, ": {stderr}")?;
        }
        Ok(())
    }
}

impl From<ProcessFailure> for FlipbookError {
    fn from(value: ProcessFailure) -> Self {
        Self::EncodingProcess(Box::new(value))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
