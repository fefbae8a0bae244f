use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotationError {
    /// Rejected before any store or network call.
    #[error("{0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error during {op}: {message}")]
    Storage { op: &'static str, message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("email error: {0}")]
    Email(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, QuotationError>;

impl QuotationError {
    pub fn validation(msg: impl Into<String>) -> Self {
        QuotationError::Validation(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        QuotationError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Short text suitable for an alert dialog or a CLI error line.
    pub fn user_message(&self) -> String {
        match self {
            QuotationError::Validation(msg) => msg.clone(),
            QuotationError::NotFound { kind, .. } => format!("The requested {kind} does not exist."),
            QuotationError::Storage { message, .. } => {
                let lower = message.to_ascii_lowercase();
                if lower.contains("readonly") || lower.contains("permission") || lower.contains("auth") {
                    "Permission denied while saving. Check that the database is writable.".to_string()
                } else if lower.contains("busy") || lower.contains("locked") {
                    "The database is busy. Please try again.".to_string()
                } else if lower.contains("toobig") || lower.contains("too big") || lower.contains("full") {
                    "The quotation is too large to save. Remove some images and try again.".to_string()
                } else {
                    "Failed to access the database.".to_string()
                }
            }
            QuotationError::Serialization(_) => "The quotation document is malformed.".to_string(),
            QuotationError::Pdf(_) => "Failed to generate the PDF.".to_string(),
            QuotationError::Image(_) => "Failed to load an image.".to_string(),
            QuotationError::Email(msg) => format!("Failed to send email: {msg}"),
            QuotationError::Http(_) => "The remote service is unavailable.".to_string(),
            QuotationError::Io(e) => format!("File operation failed: {e}"),
            QuotationError::Task(_) => "Internal error. Please try again.".to_string(),
        }
    }
}

/// One-line description of a rusqlite failure. Keeps SQLite's own message
/// and result code so `user_message` can classify it.
pub(crate) fn describe_sqlite_error(err: &rusqlite::Error) -> String {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => format!("{msg} [{:?}/{}]", e.code, e.extended_code),
        rusqlite::Error::SqliteFailure(e, None) => format!("{e} [{:?}/{}]", e.code, e.extended_code),
        rusqlite::Error::FromSqlConversionFailure(col, _, cause) => {
            format!("stored value in column {col} is unreadable: {cause}")
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_is_passed_through() {
        let err = QuotationError::validation("Please select a customer.");
        assert_eq!(err.user_message(), "Please select a customer.");
    }

    #[test]
    fn storage_errors_map_to_user_text() {
        let busy = QuotationError::Storage {
            op: "save_quotation",
            message: "database is locked [DatabaseBusy/5]".into(),
        };
        assert!(busy.user_message().contains("busy"));

        let ro = QuotationError::Storage {
            op: "save_quotation",
            message: "attempt to write a readonly database".into(),
        };
        assert!(ro.user_message().starts_with("Permission denied"));
    }

    #[test]
    fn sqlite_failures_keep_message_and_code() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_READONLY),
            Some("attempt to write a readonly database".into()),
        );
        let text = describe_sqlite_error(&err);
        assert!(text.starts_with("attempt to write a readonly database ["));
        let mapped = QuotationError::Storage { op: "save_quotation", message: text };
        assert!(mapped.user_message().starts_with("Permission denied"));
    }
}
