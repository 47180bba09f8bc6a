use std::path::PathBuf;

use thiserror::Error;

/// Stage-level failures reported by the tailoring pipeline. Each variant
/// carries the underlying cause as text so callers can log it without
/// matching on the source error type.
#[derive(Debug, Error)]
pub enum TailorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resume file not found: {}", .0.display())]
    ResumeNotFound(PathBuf),

    #[error("Failed to read resume {}: {source}", .path.display())]
    ReadResume {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output directory structure invalid: missing {}", .missing.join(", "))]
    InvalidLayout { missing: Vec<String> },

    #[error("Invalid company label '{0}': must be non-empty and contain no path separators")]
    InvalidCompany(String),

    #[error("Failed to fetch job description: {0}")]
    Fetch(String),

    #[error("Failed to scrape job description: {0}")]
    Scrape(String),

    #[error("Failed to parse job description: {0}")]
    ParseJobDescription(String),

    #[error("Posting cache error: {0}")]
    Cache(String),

    #[error("Failed to process job description: {0}")]
    JobDescription(String),

    #[error("Failed to tailor resume: {0}")]
    Tailor(String),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to generate PDF: {0}")]
    Pdf(String),
}

pub type Result<T> = std::result::Result<T, TailorError>;

/// Formats an error with its full context chain on one line.
pub(crate) fn cause(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_layout_error_lists_missing_dirs() {
        let err = TailorError::InvalidLayout {
            missing: vec!["Markdown".to_string(), "PDF".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Output directory structure invalid: missing Markdown, PDF"
        );
    }

    #[test]
    fn test_cause_keeps_context_chain() {
        let err: anyhow::Error = Err::<(), _>(std::io::Error::other("connection refused"))
            .context("request failed")
            .unwrap_err();
        assert_eq!(cause(&err), "request failed: connection refused");
    }
}
