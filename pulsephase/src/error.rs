//! Error types for the phase prediction engine.
//!
//! Every failure carries an [`ErrorKind`], a message, and a trail of the
//! frames it passed through. Callers append their own frame with
//! [`ResultExt::context`] instead of replacing the message, so a rendered
//! error reads as a call chain:
//!
//! ```text
//! invalid parameter: epoch 58123.5 not covered (Polyco::best <- Predictor::phase <- Aligner::apply_model)
//! ```

use std::fmt;
use std::io;

/// Result type for prediction operations.
pub type PredictResult<T> = Result<T, PredictError>;

/// Broad classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A caller-supplied value is out of range or inconsistent.
    InvalidParam,
    /// The object is not in a state that permits the operation.
    InvalidState,
    /// An operating-system level operation failed (files, processes).
    FailedSys,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidParam => write!(f, "invalid parameter"),
            ErrorKind::InvalidState => write!(f, "invalid state"),
            ErrorKind::FailedSys => write!(f, "failed system operation"),
        }
    }
}

/// Error raised by the prediction engine.
#[derive(Debug)]
pub struct PredictError {
    kind: ErrorKind,
    message: String,
    trail: Vec<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl PredictError {
    /// Create an error raised in `frame`.
    pub fn new(kind: ErrorKind, frame: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trail: vec![frame.into()],
            source: None,
        }
    }

    pub fn invalid_param(frame: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParam, frame, message)
    }

    pub fn invalid_state(frame: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, frame, message)
    }

    pub fn failed_sys(frame: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FailedSys, frame, message)
    }

    /// Attach the underlying cause.
    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Wrap an I/O failure on `path` as a failed system operation.
    pub fn io(frame: impl Into<String>, what: impl fmt::Display, source: io::Error) -> Self {
        Self::failed_sys(frame, format!("{}: {}", what, source)).with_source(source)
    }

    /// Append the identity of a calling frame.
    pub fn context(mut self, frame: impl Into<String>) -> Self {
        self.trail.push(frame.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Frames in the order the error passed through them, innermost first.
    pub fn trail(&self) -> &[String] {
        &self.trail
    }
}

impl fmt::Display for PredictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if !self.trail.is_empty() {
            write!(f, " ({})", self.trail.join(" <- "))?;
        }
        Ok(())
    }
}

impl std::error::Error for PredictError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Adds call-chain context to results carrying a [`PredictError`].
pub trait ResultExt<T> {
    /// Append `frame` to the error trail.
    fn context(self, frame: &str) -> PredictResult<T>;
}

impl<T> ResultExt<T> for PredictResult<T> {
    fn context(self, frame: &str) -> PredictResult<T> {
        self.map_err(|e| e.context(frame))
    }
}
