use thiserror::Error;

/// Errors raised by the filtering engine and its table readers
#[derive(Debug, Error)]
pub enum NailscanError {
    /// A hit row that cannot take part in filtering (bad numbers, inverted coordinates)
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Policy rejected before any protein is processed
    #[error("Policy misconfiguration for {database}: {reason}")]
    PolicyMisconfiguration { database: String, reason: String },

    #[error("Missing required column '{0}' in hit table header")]
    MissingColumn(&'static str),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl NailscanError {
    pub fn malformed(line: usize, reason: impl Into<String>) -> Self {
        NailscanError::MalformedRecord {
            line,
            reason: reason.into(),
        }
    }

    pub fn policy(database: impl ToString, reason: impl Into<String>) -> Self {
        NailscanError::PolicyMisconfiguration {
            database: database.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NailscanError>;
