use crate::phone::{country_code_matches, is_e164, validate_e164};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallerIdError {
    #[error("Invalid phone number format. Must be E.164 format (e.g., +12125551234)")]
    InvalidDestination,
    #[error("Cannot determine caller ID for number: {0}")]
    NoCallerId(String),
    #[error("caller ID for region '{0}' is not configured")]
    NotConfigured(String),
}

/// Outbound numbers presented for destinations within one country code.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegionCallerId {
    pub label: String,
    pub country_code: String,
    pub number: Option<String>,
    pub alternate: Option<String>,
}

impl RegionCallerId {
    fn valid_number(&self) -> Option<&str> {
        self.number.as_deref().filter(|n| is_e164(n))
    }

    fn valid_alternate(&self) -> Option<&str> {
        self.alternate.as_deref().filter(|n| is_e164(n))
    }

    fn alternate_label(&self) -> String {
        format!("{}_alt", self.label)
    }
}

/// The caller-ID table. `home` is the fallback region; `primary` is only
/// used for its own country code and falls back to `home` when unset.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CallerIdConfig {
    pub home: RegionCallerId,
    pub primary: RegionCallerId,
}

impl Default for CallerIdConfig {
    fn default() -> Self {
        Self {
            home: RegionCallerId {
                label: "israel".to_string(),
                country_code: "+972".to_string(),
                number: None,
                alternate: None,
            },
            primary: RegionCallerId {
                label: "us".to_string(),
                country_code: "+1".to_string(),
                number: None,
                alternate: None,
            },
        }
    }
}

impl CallerIdConfig {
    /// Picks the caller ID to present when dialing `destination`.
    pub fn select(&self, destination: &str, use_alternate: bool) -> Result<String, CallerIdError> {
        let destination = validate_e164(destination).ok_or(CallerIdError::InvalidDestination)?;
        self.self_check();

        if country_code_matches(&destination, &self.primary.country_code) {
            if let Some(number) = self.primary.valid_number() {
                return Ok(number.to_string());
            }
            warn!(
                region = %self.primary.label,
                fallback = %self.home.label,
                "caller ID not available or invalid, using fallback region"
            );
            return self.home_number();
        }

        if country_code_matches(&destination, &self.home.country_code) {
            if use_alternate {
                if let Some(alternate) = self.home.valid_alternate() {
                    return Ok(alternate.to_string());
                }
            }
            return self.home_number();
        }

        Err(CallerIdError::NoCallerId(destination))
    }

    fn home_number(&self) -> Result<String, CallerIdError> {
        self.home
            .valid_number()
            .map(|n| n.to_string())
            .ok_or_else(|| CallerIdError::NotConfigured(self.home.label.clone()))
    }

    fn entries(&self) -> [(String, Option<&String>); 3] {
        [
            (self.home.label.clone(), self.home.number.as_ref()),
            (self.home.alternate_label(), self.home.alternate.as_ref()),
            (self.primary.label.clone(), self.primary.number.as_ref()),
        ]
    }

    fn self_check(&self) {
        for (label, number) in self.entries() {
            if let Some(number) = number {
                if !is_e164(number) {
                    error!(label = %label, number = %number, "caller ID is not in valid E.164 format");
                }
            }
        }
    }

    /// Configuration problems as `(field, message)` pairs.
    pub fn validate(&self) -> Vec<(String, String)> {
        let mut issues = Vec::new();
        for (region, field) in [(&self.home, "caller_id.home"), (&self.primary, "caller_id.primary")] {
            match region.number.as_deref() {
                None => issues.push((
                    format!("{}.number", field),
                    format!("outbound number for '{}' is required", region.label),
                )),
                Some(number) if !is_e164(number) => issues.push((
                    format!("{}.number", field),
                    format!("'{}' is not in E.164 format", number),
                )),
                _ => {}
            }
            if let Some(alternate) = region.alternate.as_deref() {
                if !is_e164(alternate) {
                    issues.push((
                        format!("{}.alternate", field),
                        format!("'{}' is not in E.164 format", alternate),
                    ));
                }
            }
            if !region.country_code.starts_with('+') || region.country_code.len() < 2 {
                issues.push((
                    format!("{}.country_code", field),
                    format!("'{}' must be '+' followed by digits", region.country_code),
                ));
            }
        }
        issues
    }

    pub fn as_map(&self) -> BTreeMap<String, Option<String>> {
        self.entries()
            .into_iter()
            .map(|(label, number)| (label, number.cloned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn table(us: Option<&str>, il: Option<&str>, il_alt: Option<&str>) -> CallerIdConfig {
        let mut config = CallerIdConfig::default();
        config.primary.number = us.map(String::from);
        config.home.number = il.map(String::from);
        config.home.alternate = il_alt.map(String::from);
        config
    }

    #[test]
    fn test_us_destination_uses_us_number() {
        let config = table(Some("+15550001111"), Some("+97230000000"), None);
        assert_eq!(config.select("+12125551234", false).unwrap(), "+15550001111");
    }

    #[test]
    fn test_us_destination_falls_back_to_home() {
        let config = table(None, Some("+97230000000"), None);
        assert_eq!(config.select("+12125551234", false).unwrap(), "+97230000000");

        let config = config_with_invalid_us();
        assert_eq!(config.select("+12125551234", true).unwrap(), "+97230000000");
    }

    #[test]
    #[traced_test]
    fn test_fallback_logs_warning() {
        let config = table(None, Some("+97230000000"), None);
        config.select("+12125551234", false).unwrap();
        assert!(logs_contain("using fallback region"));
        assert!(!logs_contain("not in valid E.164 format"));
    }

    #[test]
    #[traced_test]
    fn test_direct_match_logs_nothing() {
        let config = table(Some("+15550001111"), Some("+97230000000"), None);
        config.select("+12125551234", false).unwrap();
        assert!(!logs_contain("using fallback region"));
    }

    #[test]
    #[traced_test]
    fn test_self_check_logs_each_invalid_entry() {
        let config = table(Some("15550001111"), Some("+97230000000"), Some("alt"));
        config.select("+12125551234", false).unwrap();
        assert!(logs_contain("caller ID is not in valid E.164 format"));
        assert!(logs_contain("number=15550001111"));
        assert!(logs_contain("number=alt"));
        assert!(logs_contain("using fallback region"));
    }

    fn config_with_invalid_us() -> CallerIdConfig {
        table(Some("15550001111"), Some("+97230000000"), None)
    }

    #[test]
    fn test_home_destination_alternate_preference() {
        let config = table(Some("+15550001111"), Some("+97230000000"), Some("+97230000001"));
        assert_eq!(config.select("+972501234567", true).unwrap(), "+97230000001");
        assert_eq!(config.select("+972501234567", false).unwrap(), "+97230000000");

        let no_alt = table(Some("+15550001111"), Some("+97230000000"), None);
        assert_eq!(no_alt.select("+972501234567", true).unwrap(), "+97230000000");

        let bad_alt = table(None, Some("+97230000000"), Some("alt"));
        assert_eq!(bad_alt.select("+972501234567", true).unwrap(), "+97230000000");
    }

    #[test]
    fn test_unmatched_region_is_rejected() {
        let config = table(Some("+15550001111"), Some("+97230000000"), None);
        assert_eq!(
            config.select("+442071234567", false),
            Err(CallerIdError::NoCallerId("+442071234567".to_string()))
        );
    }

    #[test]
    fn test_invalid_destination() {
        let config = table(Some("+15550001111"), Some("+97230000000"), None);
        assert_eq!(config.select("12125551234", false), Err(CallerIdError::InvalidDestination));
        assert_eq!(config.select("+1 212", false), Err(CallerIdError::InvalidDestination));
    }

    #[test]
    fn test_missing_home_number() {
        let config = table(None, None, None);
        assert_eq!(
            config.select("+12125551234", false),
            Err(CallerIdError::NotConfigured("israel".to_string()))
        );
    }

    #[test]
    fn test_validate_reports_missing_and_malformed() {
        let config = table(None, Some("972300"), Some("+97230000001"));
        let fields: Vec<String> = config.validate().into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec!["caller_id.home.number".to_string(), "caller_id.primary.number".to_string()]
        );
        assert!(config_full().validate().is_empty());
    }

    fn config_full() -> CallerIdConfig {
        table(Some("+15550001111"), Some("+97230000000"), Some("+97230000001"))
    }

    #[test]
    fn test_as_map_labels() {
        let map = config_full().as_map();
        assert_eq!(map.get("us").cloned().flatten().as_deref(), Some("+15550001111"));
        assert_eq!(map.get("israel").cloned().flatten().as_deref(), Some("+97230000000"));
        assert_eq!(map.get("israel_alt").cloned().flatten().as_deref(), Some("+97230000001"));
    }
}
