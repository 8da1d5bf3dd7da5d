//! Error type shared by the backend, chat, storage, and upload modules.
//!
//! Each variant corresponds to one failure class the CLI reports to the
//! user. The `Display` output is meant to be printed as-is.

use std::path::PathBuf;

/// Failures produced by the `docchat` library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required AWS credential variable is not set.
    #[error("AWS credentials missing: {var} is not set")]
    MissingCredentials { var: &'static str },

    /// The remote endpoint could not be reached (connect, DNS, or timeout).
    #[error("failed to connect to {target}: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    /// The HTTP client itself could not be constructed (TLS backend, etc.).
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The object store rejected the request.
    #[error("S3 error {code} (HTTP {status}): {message}")]
    Storage {
        status: u16,
        code: String,
        message: String,
    },

    /// User-supplied JSON could not be parsed.
    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("question is empty")]
    EmptyQuestion,

    /// An upload input is missing or is not a PDF.
    #[error("{}: {reason}", .path.display())]
    InvalidFile { path: PathBuf, reason: String },

    /// The configured storage endpoint is not a usable URL.
    #[error("invalid storage endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short label for the failure class, used in upload summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCredentials { .. } => "missing credentials",
            Error::Unreachable { .. } => "endpoint unreachable",
            Error::HttpClient(_) => "http client",
            Error::Http { .. } => "http error",
            Error::Storage { .. } => "storage error",
            Error::MalformedJson(_) => "malformed json",
            Error::EmptyQuestion => "empty question",
            Error::InvalidFile { .. } => "invalid file",
            Error::InvalidEndpoint(_) => "invalid endpoint",
            Error::Io(_) => "io error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_display_includes_code_and_message() {
        let err = Error::Storage {
            status: 403,
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "S3 error AccessDenied (HTTP 403): Access Denied"
        );
        assert_eq!(err.kind(), "storage error");
    }

    #[test]
    fn missing_credentials_names_variable() {
        let err = Error::MissingCredentials {
            var: "AWS_ACCESS_KEY_ID",
        };
        assert!(err.to_string().contains("AWS_ACCESS_KEY_ID"));
    }

    #[test]
    fn http_client_error_is_its_own_class() {
        let source = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        let err = Error::HttpClient(source);
        assert_eq!(err.kind(), "http client");
        assert!(err.to_string().starts_with("failed to build HTTP client: "));
    }

    #[test]
    fn invalid_file_display_starts_with_path() {
        let err = Error::InvalidFile {
            path: PathBuf::from("notes.txt"),
            reason: "not a PDF".to_string(),
        };
        assert_eq!(err.to_string(), "notes.txt: not a PDF");
    }
}
