use crate::callerid::CallerIdConfig;
use crate::token::{DEFAULT_IDENTITY, DEFAULT_TOKEN_TTL};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_RING_TIMEOUT: u32 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http_addr: String,
    pub log_level: Option<String>,
    pub log_file: Option<String>,
    pub static_dir: String,
    pub data_dir: String,
    pub provider: ProviderConfig,
    pub caller_id: CallerIdConfig,
}

/// Voice provider credentials and client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub account_sid: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub app_sid: Option<String>,
    pub identity: String,
    pub token_ttl: u64,
    pub ring_timeout: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            api_key: None,
            api_secret: None,
            app_sid: None,
            identity: DEFAULT_IDENTITY.to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            ring_timeout: DEFAULT_RING_TIMEOUT,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:5000".to_string(),
            log_level: Some("info".to_string()),
            log_file: None,
            static_dir: "static".to_string(),
            data_dir: ".".to_string(),
            provider: ProviderConfig::default(),
            caller_id: CallerIdConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigIssue {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
#[error("invalid configuration:{}", render_issues(.issues))]
pub struct ConfigError {
    pub issues: Vec<ConfigIssue>,
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!(" {}: {};", issue.field, issue.message))
        .collect()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let config = toml::from_str(
            &std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("{}: {}", e, path))?,
        )?;
        Ok(config)
    }

    /// Overlays the `TWILIO_*` environment variables of the original
    /// deployment onto the loaded configuration.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let provider = &mut self.provider;
        for (name, slot) in [
            ("TWILIO_ACCOUNT_SID", &mut provider.account_sid),
            ("TWILIO_API_KEY", &mut provider.api_key),
            ("TWILIO_API_SECRET", &mut provider.api_secret),
            ("TWILIO_TWIML_APP_SID", &mut provider.app_sid),
            ("TWILIO_PHONE_IL", &mut self.caller_id.home.number),
            ("TWILIO_PHONE_IL_ALT", &mut self.caller_id.home.alternate),
            ("TWILIO_PHONE_US", &mut self.caller_id.primary.number),
        ] {
            if let Some(value) = get(name) {
                *slot = Some(value);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();
        for (field, value) in [
            ("provider.account_sid", &self.provider.account_sid),
            ("provider.api_key", &self.provider.api_key),
            ("provider.api_secret", &self.provider.api_secret),
            ("provider.app_sid", &self.provider.app_sid),
        ] {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                issues.push(ConfigIssue {
                    field: field.to_string(),
                    message: "is required".to_string(),
                });
            }
        }
        if self.provider.identity.trim().is_empty() {
            issues.push(ConfigIssue {
                field: "provider.identity".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.http_addr.parse::<SocketAddr>().is_err() {
            issues.push(ConfigIssue {
                field: "http_addr".to_string(),
                message: format!("'{}' is not a valid socket address", self.http_addr),
            });
        }
        issues.extend(
            self.caller_id
                .validate()
                .into_iter()
                .map(|(field, message)| ConfigIssue { field, message }),
        );
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError { issues })
        }
    }

    pub fn data_path(&self, file: &str) -> PathBuf {
        PathBuf::from(&self.data_dir).join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn complete() -> Config {
        let mut config = Config::default();
        config.provider.account_sid = Some("ACxxx".to_string());
        config.provider.api_key = Some("SKxxx".to_string());
        config.provider.api_secret = Some("secret".to_string());
        config.provider.app_sid = Some("APxxx".to_string());
        config.caller_id.home.number = Some("+97230000000".to_string());
        config.caller_id.primary.number = Some("+15550001111".to_string());
        config
    }

    #[test]
    fn test_load_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
http_addr = "127.0.0.1:5050"
data_dir = "/var/lib/voicebridge"

[provider]
account_sid = "ACxxx"
api_key = "SKxxx"
api_secret = "secret"
app_sid = "APxxx"
token_ttl = 3600

[caller_id.home]
label = "israel"
country_code = "+972"
number = "+97230000000"
alternate = "+97230000001"

[caller_id.primary]
label = "us"
country_code = "+1"
number = "+15550001111"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.http_addr, "127.0.0.1:5050");
        assert_eq!(config.provider.token_ttl, 3600);
        assert_eq!(config.provider.identity, DEFAULT_IDENTITY);
        assert_eq!(config.provider.ring_timeout, DEFAULT_RING_TIMEOUT);
        assert_eq!(config.caller_id.home.alternate.as_deref(), Some("+97230000001"));
        assert_eq!(
            config.data_path("contacts.json"),
            PathBuf::from("/var/lib/voicebridge/contacts.json")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_settings_are_reported() {
        let err = Config::default().validate().unwrap_err();
        let fields: Vec<&str> = err.issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"provider.account_sid"));
        assert!(fields.contains(&"provider.api_key"));
        assert!(fields.contains(&"provider.api_secret"));
        assert!(fields.contains(&"provider.app_sid"));
        assert!(fields.contains(&"caller_id.home.number"));
        assert!(fields.contains(&"caller_id.primary.number"));
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_malformed_number_is_fatal() {
        let mut config = complete();
        config.caller_id.primary.number = Some("1555 000 1111".to_string());
        let err = config.validate().unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].field, "caller_id.primary.number");
        assert_eq!(
            err.to_string(),
            "invalid configuration: caller_id.primary.number: '1555 000 1111' is not in E.164 format;"
        );
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            ("TWILIO_ACCOUNT_SID", "ACenv"),
            ("TWILIO_PHONE_IL_ALT", "+97230000009"),
            ("TWILIO_PHONE_US", "  "),
        ]
        .into_iter()
        .collect();
        let mut config = complete();
        config.apply_vars(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.provider.account_sid.as_deref(), Some("ACenv"));
        assert_eq!(config.caller_id.home.alternate.as_deref(), Some("+97230000009"));
        assert_eq!(config.caller_id.primary.number.as_deref(), Some("+15550001111"));
    }
}
