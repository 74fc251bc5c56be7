use crate::domain::model::AcknowledgePolicy;
use crate::domain::ports::ReconcileConfig;
use crate::utils::error::{BounceError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

/// 未指定 --config 時使用的設定
pub const DEFAULT_CONFIG: &str = r#"
[provider]
api_key = "${SENDGRID_API_KEY}"
"#;

/// Largest page the bounce endpoint returns.
pub const MAX_FETCH_LIMIT: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub provider: ProviderSettings,
    #[serde(default)]
    pub directory: DirectorySettings,
    #[serde(default)]
    pub classifier: ClassifierSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub bounces_path: String,
    pub fetch_limit: usize,
    pub timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.sendgrid.com/v3".to_string(),
            bounces_path: "/suppression/bounces".to_string(),
            fetch_limit: MAX_FETCH_LIMIT,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub database_path: String,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            database_path: "./accounts.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub additional_indicators: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub acknowledge: AcknowledgePolicy,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid"))
}

/// 替換環境變數 (例如 ${SENDGRID_API_KEY})，未設定的保留原字串
fn substitute_placeholders(value: &str) -> String {
    placeholder_pattern()
        .replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

impl Settings {
    /// 從 TOML 檔案載入設定
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(BounceError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 內建預設設定，金鑰從環境變數讀取
    pub fn from_env() -> Result<Self> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut settings: Settings =
            toml::from_str(content).map_err(|e| BounceError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        // 解析後才逐欄替換，環境變數的值不會被當成 TOML 語法
        settings.substitute_env_vars();
        Ok(settings)
    }

    fn substitute_env_vars(&mut self) {
        if let Some(api_key) = self.provider.api_key.as_mut() {
            *api_key = substitute_placeholders(api_key);
        }
        self.provider.base_url = substitute_placeholders(&self.provider.base_url);
        self.provider.bounces_path = substitute_placeholders(&self.provider.bounces_path);
        self.directory.database_path = substitute_placeholders(&self.directory.database_path);
    }

    /// Configured API key, if it is usable. An empty value or an
    /// unsubstituted placeholder counts as absent.
    pub fn credential(&self) -> Option<&str> {
        self.provider
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty() && !placeholder_pattern().is_match(key))
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_url("provider.base_url", &self.provider.base_url)?;
        validation::validate_api_path("provider.bounces_path", &self.provider.bounces_path)?;
        validation::validate_range(
            "provider.fetch_limit",
            self.provider.fetch_limit,
            1,
            MAX_FETCH_LIMIT,
        )?;
        validation::validate_positive_number(
            "provider.timeout_seconds",
            self.provider.timeout_seconds,
            1,
        )?;
        validation::validate_path("directory.database_path", &self.directory.database_path)?;

        for indicator in &self.classifier.additional_indicators {
            validation::validate_non_empty_string("classifier.additional_indicators", indicator)?;
        }

        Ok(())
    }
}

impl ReconcileConfig for Settings {
    fn credential(&self) -> Option<&str> {
        Settings::credential(self)
    }

    fn fetch_limit(&self) -> usize {
        self.provider.fetch_limit
    }

    fn acknowledge_policy(&self) -> AcknowledgePolicy {
        self.reconcile.acknowledge
    }

    fn additional_indicators(&self) -> &[String] {
        &self.classifier.additional_indicators
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
