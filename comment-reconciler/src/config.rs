//! Reconciler configuration: instance id and out-of-range dismissal policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, MrResult};
use crate::findings::FindingKind;
use crate::reconcile::render::Marker;

/// Whether out-of-range findings are dropped silently instead of going to
/// the summary. Either one flag for every kind or a per-kind map; kinds
/// missing from the map are not dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DismissPolicy {
    All(bool),
    PerKind(BTreeMap<FindingKind, bool>),
}

impl Default for DismissPolicy {
    fn default() -> Self {
        DismissPolicy::All(false)
    }
}

impl DismissPolicy {
    pub fn dismisses(&self, kind: FindingKind) -> bool {
        match self {
            DismissPolicy::All(v) => *v,
            DismissPolicy::PerKind(map) => map.get(&kind).copied().unwrap_or(false),
        }
    }

    /// Parses `true`/`false` or a comma list of kinds (`error,warning`).
    pub fn parse(s: &str) -> MrResult<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => return Ok(DismissPolicy::All(false)),
            "1" | "true" | "yes" | "on" => return Ok(DismissPolicy::All(true)),
            _ => {}
        }
        let mut map = BTreeMap::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = FindingKind::parse(part)
                .ok_or_else(|| ConfigError::InvalidDismissPolicy(format!("unknown kind {part:?}")))?;
            map.insert(kind, true);
        }
        Ok(DismissPolicy::PerKind(map))
    }
}

/// Configuration of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Instance identifier; comments carry `generated_by_<danger_id>`.
    pub danger_id: String,
    pub dismiss_out_of_range: DismissPolicy,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::new("danger", DismissPolicy::default())
    }
}

impl ReconcilerConfig {
    pub fn new(danger_id: impl Into<String>, dismiss_out_of_range: DismissPolicy) -> Self {
        Self {
            danger_id: danger_id.into(),
            dismiss_out_of_range,
        }
    }

    /// Reads `DANGER_ID` and `DANGER_DISMISS_OUT_OF_RANGE`.
    pub fn from_env() -> MrResult<Self> {
        Self::from_values(
            std::env::var("DANGER_ID").ok(),
            std::env::var("DANGER_DISMISS_OUT_OF_RANGE").ok(),
        )
    }

    /// Builds a validated config from raw setting values; `None` or blank
    /// means "use the default".
    pub fn from_values(danger_id: Option<String>, dismiss: Option<String>) -> MrResult<Self> {
        let mut cfg = Self::default();
        if let Some(id) = danger_id.filter(|v| !v.trim().is_empty()) {
            cfg.danger_id = id.trim().to_string();
        }
        if let Some(raw) = dismiss {
            cfg.dismiss_out_of_range = DismissPolicy::parse(&raw)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates config values.
    pub fn validate(&self) -> MrResult<()> {
        let id = self.danger_id.as_str();
        let ok = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !ok {
            return Err(ConfigError::InvalidDangerId(id.to_string()).into());
        }
        Ok(())
    }

    pub fn marker(&self) -> Marker {
        Marker::new(&self.danger_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dismiss_policy_parsing() {
        assert_eq!(DismissPolicy::parse("true").unwrap(), DismissPolicy::All(true));
        assert_eq!(DismissPolicy::parse("").unwrap(), DismissPolicy::All(false));

        let p = DismissPolicy::parse("error, warnings").unwrap();
        assert!(p.dismisses(FindingKind::Error));
        assert!(p.dismisses(FindingKind::Warning));
        assert!(!p.dismisses(FindingKind::Message));

        assert!(DismissPolicy::parse("error,bogus").is_err());
    }

    #[test]
    fn dismiss_policy_from_json() {
        let all: DismissPolicy = serde_json::from_str("true").unwrap();
        assert_eq!(all, DismissPolicy::All(true));

        let per: DismissPolicy =
            serde_json::from_str(r#"{"error": true, "warning": false}"#).unwrap();
        assert!(per.dismisses(FindingKind::Error));
        assert!(!per.dismisses(FindingKind::Warning));
        assert!(!per.dismisses(FindingKind::Markdown));
    }

    #[test]
    fn danger_id_validation() {
        assert!(ReconcilerConfig::new("danger", DismissPolicy::default()).validate().is_ok());
        assert!(ReconcilerConfig::new("lint-bot_2", DismissPolicy::default()).validate().is_ok());
        assert!(ReconcilerConfig::new("", DismissPolicy::default()).validate().is_err());
        assert!(ReconcilerConfig::new("two words", DismissPolicy::default()).validate().is_err());
    }

    #[test]
    fn from_values_rejects_unknown_dismiss_kind() {
        let err = ReconcilerConfig::from_values(None, Some("erorr".into())).unwrap_err();
        assert!(matches!(
            err,
            crate::errors::Error::Config(ConfigError::InvalidDismissPolicy(_))
        ));
    }

    #[test]
    fn from_values_defaults_and_overrides() {
        let cfg = ReconcilerConfig::from_values(None, None).unwrap();
        assert_eq!(cfg.danger_id, "danger");
        assert_eq!(cfg.dismiss_out_of_range, DismissPolicy::All(false));

        let cfg = ReconcilerConfig::from_values(Some("lint".into()), Some("warning".into())).unwrap();
        assert_eq!(cfg.danger_id, "lint");
        assert!(cfg.dismiss_out_of_range.dismisses(FindingKind::Warning));
        assert!(!cfg.dismiss_out_of_range.dismisses(FindingKind::Error));

        assert!(ReconcilerConfig::from_values(Some("two words".into()), None).is_err());
    }
}
