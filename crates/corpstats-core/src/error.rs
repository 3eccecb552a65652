//! Common error type for export, compression and installation steps

use std::fmt;
use std::path::Path;

/// Error from one export, compression or install operation.
///
/// Every variant carries enough context (file, annotation, variant or
/// command) to diagnose a failure from the log line alone.
#[derive(Debug)]
pub enum Error {
    /// A required setting is missing or malformed.
    Configuration(String),
    /// An annotation column does not have one value per token.
    Alignment {
        source_file: String,
        annotation: String,
        expected: usize,
        actual: usize,
    },
    /// Local read/write failure.
    Io {
        context: String,
        source: std::io::Error,
    },
    /// External transport command failed, could not start, or timed out.
    Transport { command: String, message: String },
    /// Unknown compression identifier.
    UnsupportedCodec(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(msg) => write!(f, "configuration: {msg}"),
            Self::Alignment {
                source_file,
                annotation,
                expected,
                actual,
            } => write!(
                f,
                "{source_file}: annotation '{annotation}' has {actual} values, expected {expected} (one per token)"
            ),
            Self::Io { context, source } => write!(f, "IO: {context}: {source}"),
            Self::Transport { command, message } => {
                write!(f, "transport: `{command}` failed: {message}")
            }
            Self::UnsupportedCodec(id) => write!(f, "unsupported compression codec '{id}'"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// IO error whose context is a path.
    pub fn at_path(path: &Path, source: std::io::Error) -> Self {
        Self::io(path.display().to_string(), source)
    }

    /// Local IO and transport failures both count as IO errors.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Transport { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
