use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use overlay::{FillMap, OverlayConfig, SynonymTable};

use crate::prelude::*;

/// One job's configuration: what to fill, what to highlight, and any
/// synonym or overlay-constant overrides.
///
/// Loaded from JSON. Unknown keys are rejected so typos in a config file
/// surface immediately instead of silently doing nothing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Canonical field key -> value to fill in.
    #[serde(default)]
    pub fill: FillMap,
    /// Terms to highlight wherever they occur.
    #[serde(default)]
    pub highlight: Vec<String>,
    /// Extra label phrasings, merged over the stock table. An entry for
    /// an existing key replaces that key's phrasings.
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,
    /// Placement and compositing constant overrides.
    #[serde(default)]
    pub overlay: Option<OverlayConfig>,
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .wrap_err_with(|| f!("failed to read config {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
            .wrap_err_with(|| f!("invalid config {}", path.display()))
    }

    /// The stock synonym table with this job's overrides applied.
    pub fn synonym_table(&self) -> SynonymTable {
        let mut table = SynonymTable::stock();
        for (key, phrasings) in &self.synonyms {
            table.insert(key.clone(), phrasings.iter().cloned());
        }
        table
    }

    pub fn overlay_config(&self) -> OverlayConfig {
        self.overlay.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let cfg: JobConfig = serde_json::from_str(r#"{"fill": {"phone": "555-1234"}}"#).unwrap();
        assert_eq!(cfg.fill.get("phone"), Some("555-1234"));
        assert!(cfg.highlight.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let cfg: JobConfig = serde_json::from_str(
            r#"{
                "fill": {"phone": "555-1234"},
                "highlight": ["signature"],
                "synonyms": {"fax": ["fax", "facsimile"]},
                "overlay": {"label_gap": 8.0}
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.highlight, vec!["signature".to_string()]);
        assert_eq!(cfg.overlay_config().label_gap, 8.0);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = serde_json::from_str::<JobConfig>(r#"{"fil": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_synonym_override_extends_stock_table() {
        let cfg: JobConfig =
            serde_json::from_str(r#"{"synonyms": {"fax": ["fax", "facsimile"]}}"#).unwrap();
        let table = cfg.synonym_table();
        assert!(table.phrasings("fax").is_some());
        // Stock entries survive the merge.
        assert!(table.phrasings("phone").is_some());
    }

    #[test]
    fn test_synonym_override_replaces_existing_key() {
        let cfg: JobConfig =
            serde_json::from_str(r#"{"synonyms": {"phone": ["landline"]}}"#).unwrap();
        let table = cfg.synonym_table();
        assert_eq!(table.phrasings("phone").unwrap(), &["landline".to_string()]);
    }

    #[test]
    fn test_overlay_defaults_when_absent() {
        let cfg: JobConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.overlay_config(), OverlayConfig::default());
    }
}
