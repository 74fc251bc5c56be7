use crate::domain::model::{BounceNotification, Classification};

/// Reason fragments that mark a permanent failure when the provider gives no
/// usable status code. Raw SMTP codes cover providers that only echo the
/// server response.
pub const DEFAULT_HARD_BOUNCE_INDICATORS: &[&str] = &[
    "user unknown",
    "inactive",
    "does not exist",
    "invalid",
    "disabled",
    "5.1.1",
    "5.2.1",
];

/// SMTP permanent-failure class prefix.
const PERMANENT_STATUS_PREFIX: &str = "5.";

#[derive(Debug, Clone)]
pub struct BounceClassifier {
    indicators: Vec<String>,
}

impl BounceClassifier {
    pub fn new<I, S>(indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let indicators = indicators
            .into_iter()
            .map(|indicator| indicator.as_ref().trim().to_lowercase())
            .filter(|indicator| !indicator.is_empty())
            .collect();
        Self { indicators }
    }

    /// Default indicator set plus operator supplied extras.
    pub fn with_additional(extra: &[String]) -> Self {
        Self::new(
            DEFAULT_HARD_BOUNCE_INDICATORS
                .iter()
                .copied()
                .chain(extra.iter().map(String::as_str)),
        )
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn classify(&self, bounce: &BounceNotification) -> Classification {
        // 有 5.x.x 狀態碼就直接判定，不看原因文字
        let permanent_status = bounce
            .status_code
            .as_deref()
            .map(str::trim)
            .is_some_and(|status| status.starts_with(PERMANENT_STATUS_PREFIX));
        if permanent_status {
            return Classification::Hard;
        }

        let reason = bounce.reason.to_lowercase();
        if self
            .indicators
            .iter()
            .any(|indicator| reason.contains(indicator.as_str()))
        {
            Classification::Hard
        } else {
            Classification::Soft
        }
    }
}

impl Default for BounceClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HARD_BOUNCE_INDICATORS)
    }
}
