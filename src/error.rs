//! Error types for stage loading and configuration.
//!
//! Everything here is a configuration problem: a malformed shape, a stage that
//! asks for more instances than a kind can hold, or a settings file that does
//! not parse. These abort the stage load; they are never retried at runtime.
//! Transient input races (a pointer-up with no pointer-down) are not errors and
//! never reach this type.

use std::fmt;

use crate::renderer::InstanceKind;

/// Result alias used across the crate
pub type GameResult<T> = Result<T, GameError>;

/// Top-level error enum for the game core.
#[derive(Debug)]
pub enum GameError {
    /// A collider part has a non-positive or non-finite extent.
    InvalidShape {
        /// What the shape belongs to (kind name or "ground").
        owner: String,
        /// Index of the offending part within the compound.
        part: usize,
    },

    /// A body description is inconsistent, e.g. a dynamic body with no mass.
    InvalidBody {
        /// Human-readable reason.
        reason: String,
    },

    /// More instance slots were requested than the kind's fixed capacity.
    SlotCapacityExceeded {
        kind: InstanceKind,
        capacity: usize,
    },

    /// A stage definition is missing data or violates a constraint.
    InvalidStage {
        title: String,
        reason: String,
    },

    /// A settings or stage file could not be parsed.
    Settings {
        path: String,
        message: String,
    },

    /// A settings or stage file could not be read.
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameError::InvalidShape { owner, part } => {
                write!(f, "invalid shape for {owner}: part {part} has a non-positive extent")
            }
            GameError::InvalidBody { reason } => write!(f, "invalid body: {reason}"),
            GameError::SlotCapacityExceeded { kind, capacity } => write!(
                f,
                "instance capacity exceeded for {}: at most {capacity} slots",
                kind.as_str()
            ),
            GameError::InvalidStage { title, reason } => {
                write!(f, "invalid stage \"{title}\": {reason}")
            }
            GameError::Settings { path, message } => {
                write!(f, "failed to parse {path}: {message}")
            }
            GameError::Io { path, source } => write!(f, "failed to read {path}: {source}"),
        }
    }
}

impl std::error::Error for GameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GameError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_kind_and_capacity() {
        let err = GameError::SlotCapacityExceeded {
            kind: InstanceKind::Ball,
            capacity: 50,
        };
        let text = err.to_string();
        assert!(text.contains("ball"));
        assert!(text.contains("50"));
    }

    #[test]
    fn test_io_error_has_source() {
        use std::error::Error;

        let err = GameError::Io {
            path: "missing.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.source().is_some());
    }
}
