use thiserror::Error;

#[derive(Error, Debug)]
pub enum BounceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Bounce source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Failed to acknowledge bounce for {address}: {message}")]
    AcknowledgeFailed { address: String, message: String },

    #[error("Provider client unavailable: {message}")]
    ClientUnavailable { message: String },

    #[error("Account directory error: {message}")]
    DirectoryError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BounceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BounceError::SourceUnavailable { .. }
            | BounceError::AcknowledgeFailed { .. }
            | BounceError::ClientUnavailable { .. } => ErrorCategory::Network,
            BounceError::DatabaseError(_)
            | BounceError::IoError(_)
            | BounceError::DirectoryError { .. } => ErrorCategory::Storage,
            BounceError::UrlError(_)
            | BounceError::ConfigError { .. }
            | BounceError::InvalidConfigValueError { .. }
            | BounceError::ConfigValidationError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單筆確認失敗，下次執行會再處理
            BounceError::AcknowledgeFailed { .. } => ErrorSeverity::Low,
            BounceError::SourceUnavailable { .. } | BounceError::ClientUnavailable { .. } => {
                ErrorSeverity::Medium
            }
            BounceError::UrlError(_)
            | BounceError::ConfigError { .. }
            | BounceError::InvalidConfigValueError { .. }
            | BounceError::ConfigValidationError { .. } => ErrorSeverity::High,
            BounceError::DatabaseError(_)
            | BounceError::IoError(_)
            | BounceError::DirectoryError { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check provider credentials and network connectivity; the next run will retry"
            }
            ErrorCategory::Storage => {
                "Check that the account database exists, is writable and is not locked"
            }
            ErrorCategory::Configuration => "Review the configuration file and environment variables",
        }
    }
}

pub type Result<T> = std::result::Result<T, BounceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledge_failure_is_low_severity() {
        let err = BounceError::AcknowledgeFailed {
            address: "a@x.com".to_string(),
            message: "HTTP 500".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert_eq!(
            err.to_string(),
            "Failed to acknowledge bounce for a@x.com: HTTP 500"
        );
    }

    #[test]
    fn test_directory_errors_are_critical() {
        let err = BounceError::DirectoryError {
            message: "locked".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert!(err.severity() > ErrorSeverity::High);
    }

    #[test]
    fn test_configuration_errors_share_category() {
        let errors = [
            BounceError::ConfigError {
                message: "missing section".to_string(),
            },
            BounceError::InvalidConfigValueError {
                field: "reconcile.acknowledge".to_string(),
                value: "some".to_string(),
                reason: "expected all or hard_only".to_string(),
            },
            BounceError::ConfigValidationError {
                field: "provider.fetch_limit".to_string(),
                message: "must be between 1 and 500".to_string(),
            },
        ];

        for err in &errors {
            assert_eq!(err.category(), ErrorCategory::Configuration);
            assert_eq!(err.severity(), ErrorSeverity::High);
            assert!(err.recovery_suggestion().contains("configuration"));
        }
    }
}
