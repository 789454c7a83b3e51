use std::path::PathBuf;

use thiserror::Error;

/// All errors produced by the Dials engine.
///
/// None of these are fatal to an instrumented page: the scanner swallows
/// per-sheet failures, and everything else surfaces only at the snapshot
/// and file boundaries.
#[derive(Debug, Error)]
pub enum DialsError {
    /// The host refused access to a stylesheet's rules (cross-origin).
    #[error("stylesheet {index} is not readable{}", href_suffix(.href))]
    SheetUnreadable {
        index: usize,
        href: Option<String>,
    },
    /// The host threw while its rule list was being read.
    #[error("host error: {0}")]
    Host(String),
    /// A stylesheet or edit snapshot could not be decoded.
    #[error("malformed snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
    /// Reading a snapshot file failed.
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn href_suffix(href: &Option<String>) -> String {
    match href {
        Some(h) => format!(" ({h})"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, DialsError>;

/// Shorthand constructors.
impl DialsError {
    pub fn unreadable(index: usize, href: Option<&str>) -> Self {
        Self::SheetUnreadable {
            index,
            href: href.map(str::to_string),
        }
    }

    pub fn host(msg: &str) -> Self {
        Self::Host(msg.to_string())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the scanner may skip past this error and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SheetUnreadable { .. } | Self::Host(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_message_names_href() {
        let err = DialsError::unreadable(2, Some("https://cdn.example.com/a.css"));
        assert_eq!(
            err.to_string(),
            "stylesheet 2 is not readable (https://cdn.example.com/a.css)"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn snapshot_errors_are_not_recoverable() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = DialsError::from(json_err);
        assert!(!err.is_recoverable());
        assert!(err.to_string().starts_with("malformed snapshot"));
    }
}
