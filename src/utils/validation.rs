use crate::utils::error::{BounceError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(BounceError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// API 路徑必須以 `/` 開頭，會直接接在 base_url 後面
pub fn validate_api_path(field_name: &str, path: &str) -> Result<()> {
    validate_non_empty_string(field_name, path)?;
    if !path.starts_with('/') {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "API path must start with '/'".to_string(),
        });
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(BounceError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("provider.base_url", "https://api.sendgrid.com/v3").is_ok());
        assert!(validate_url("provider.base_url", "http://127.0.0.1:8080").is_ok());
        assert!(validate_url("provider.base_url", "").is_err());
        assert!(validate_url("provider.base_url", "invalid-url").is_err());
        assert!(validate_url("provider.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_api_path() {
        assert!(validate_api_path("provider.bounces_path", "/suppression/bounces").is_ok());
        assert!(validate_api_path("provider.bounces_path", "suppression/bounces").is_err());
        assert!(validate_api_path("provider.bounces_path", "  ").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("provider.fetch_limit", 500, 1, 500).is_ok());
        assert!(validate_range("provider.fetch_limit", 0, 1, 500).is_err());
        assert!(validate_range("provider.fetch_limit", 501, 1, 500).is_err());
    }

    #[test]
    fn test_validate_path_rejects_nul() {
        assert!(validate_path("directory.database_path", "./accounts.db").is_ok());
        assert!(validate_path("directory.database_path", "").is_err());
        assert!(validate_path("directory.database_path", "acc\0ounts.db").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("provider.timeout_seconds", 30, 1).is_ok());
        assert!(validate_positive_number("provider.timeout_seconds", 0, 1).is_err());
    }
}
