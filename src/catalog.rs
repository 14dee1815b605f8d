//! Metric catalog - named metric definitions consumed by the engine
//!
//! The catalog is plain data: which raw events make up each feature, the
//! ordered funnel steps, the segmentation tiers and the marker event used to
//! split new from returning users. The engine is generic over it and never
//! names a feature itself.
//!
//! Catalogs load from JSON (`METRIC_CATALOG_PATH`); without one the built-in
//! [`MetricCatalog::default`] applies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Cohort lookbacks and checkpoints past this many weeks draw a warning
const MAX_COHORT_WEEKS: u32 = 520;

#[derive(Debug)]
pub enum CatalogError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err)
    }
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::Io(e) => write!(f, "Catalog IO error: {}", e),
            CatalogError::Parse(e) => write!(f, "Catalog parse error: {}", e),
        }
    }
}

impl std::error::Error for CatalogError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDef {
    pub name: String,
    pub events: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStepDef {
    pub event_name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelDef {
    pub name: String,
    pub steps: Vec<FunnelStepDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentThreshold {
    pub min_events: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVsReturningDef {
    pub marker_event: String,
    pub new_flag: String,
    pub returning_flag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortDef {
    pub weeks_back: u32,
    pub checkpoints: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionDef {
    pub name: String,
    pub from_event: String,
    pub to_event: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricCatalog {
    pub version: u32,
    pub features: Vec<FeatureDef>,
    pub funnels: Vec<FunnelDef>,
    pub segments: Vec<SegmentThreshold>,
    /// Event property summed per user for segment averages
    pub segment_value_key: String,
    pub new_vs_returning: NewVsReturningDef,
    #[serde(default)]
    pub weekly_special_event: Option<String>,
    pub cohort: CohortDef,
    #[serde(default)]
    pub session_stages: Vec<String>,
    #[serde(default)]
    pub conversions: Vec<ConversionDef>,
}

fn step(event_name: &str, label: &str) -> FunnelStepDef {
    FunnelStepDef {
        event_name: event_name.to_string(),
        label: label.to_string(),
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for MetricCatalog {
    fn default() -> Self {
        Self {
            version: 1,
            features: vec![
                FeatureDef {
                    name: "Onboarding".to_string(),
                    events: strings(&["onboarding_started", "onboarding_completed"]),
                },
                FeatureDef {
                    name: "Basket search".to_string(),
                    events: strings(&["basket_search_submitted", "basket_results_displayed"]),
                },
                FeatureDef {
                    name: "Store compare".to_string(),
                    events: strings(&["store_compare_opened"]),
                },
                FeatureDef {
                    name: "Assistant chat".to_string(),
                    events: strings(&["chat_opened", "chat_message_sent"]),
                },
            ],
            funnels: vec![
                FunnelDef {
                    name: "Onboarding".to_string(),
                    steps: vec![
                        step("onboarding_started", "Started"),
                        step("onboarding_completed", "Completed"),
                    ],
                },
                FunnelDef {
                    name: "Basket".to_string(),
                    steps: vec![
                        step("basket_search_submitted", "Search"),
                        step("basket_results_displayed", "Results"),
                        step("store_compare_opened", "Compare"),
                    ],
                },
            ],
            segments: vec![
                SegmentThreshold { min_events: 50, label: "Power".to_string() },
                SegmentThreshold { min_events: 20, label: "Active".to_string() },
                SegmentThreshold { min_events: 5, label: "Casual".to_string() },
                SegmentThreshold { min_events: 0, label: "New".to_string() },
            ],
            segment_value_key: "savings".to_string(),
            new_vs_returning: NewVsReturningDef {
                marker_event: "app_installed".to_string(),
                new_flag: "is_new_user".to_string(),
                returning_flag: "is_returning_device".to_string(),
            },
            weekly_special_event: Some("basket_results_displayed".to_string()),
            cohort: CohortDef {
                weeks_back: 8,
                checkpoints: vec![1, 2, 4],
            },
            session_stages: strings(&["started", "searching", "basket_built", "completed"]),
            conversions: vec![ConversionDef {
                name: "Search to results".to_string(),
                from_event: "basket_search_submitted".to_string(),
                to_event: "basket_results_displayed".to_string(),
            }],
        }
    }
}

impl MetricCatalog {
    /// Load a catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path.as_ref())?;
        let catalog: MetricCatalog = serde_json::from_str(&json)?;
        log::info!(
            "📚 Loaded metric catalog v{} from {} ({} features, {} funnels)",
            catalog.version,
            path.as_ref().display(),
            catalog.features.len(),
            catalog.funnels.len()
        );
        Ok(catalog)
    }

    /// Every raw event name mapped to some feature
    pub fn known_events(&self) -> BTreeSet<&str> {
        self.features
            .iter()
            .flat_map(|f| f.events.iter().map(String::as_str))
            .collect()
    }

    pub fn funnel(&self, name: &str) -> Option<&FunnelDef> {
        self.funnels.iter().find(|f| f.name == name)
    }

    /// Configuration problems that degrade to zero-count metrics
    ///
    /// A funnel step naming an event outside every feature is allowed and
    /// simply reports no activity; it is returned here so callers can log it.
    pub fn validate(&self) -> Vec<String> {
        let known = self.known_events();
        let mut warnings = Vec::new();

        for funnel in &self.funnels {
            for s in &funnel.steps {
                if !known.contains(s.event_name.as_str()) {
                    warnings.push(format!(
                        "funnel '{}' step '{}' references unknown event '{}'",
                        funnel.name, s.label, s.event_name
                    ));
                }
            }
        }

        let mut seen = BTreeSet::new();
        for threshold in &self.segments {
            if !seen.insert(threshold.min_events) {
                warnings.push(format!(
                    "segment '{}' repeats min_events {}; only the first is reachable",
                    threshold.label, threshold.min_events
                ));
            }
        }

        if self.cohort.weeks_back == 0 {
            warnings.push("cohort.weeks_back is 0; retention will be empty".to_string());
        } else if self.cohort.weeks_back > MAX_COHORT_WEEKS {
            warnings.push(format!(
                "cohort.weeks_back {} exceeds {}; the fetch will scan the whole history",
                self.cohort.weeks_back, MAX_COHORT_WEEKS
            ));
        }
        for &k in &self.cohort.checkpoints {
            if k > MAX_COHORT_WEEKS {
                warnings.push(format!("cohort checkpoint {} exceeds {} weeks", k, MAX_COHORT_WEEKS));
            }
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = MetricCatalog::default();
        assert!(catalog.validate().is_empty(), "{:?}", catalog.validate());
        assert!(catalog.known_events().contains("basket_results_displayed"));
        assert_eq!(catalog.funnel("Onboarding").unwrap().steps.len(), 2);
    }

    #[test]
    fn test_oversized_cohort_is_a_warning() {
        let mut catalog = MetricCatalog::default();
        catalog.cohort.weeks_back = 20_000_000;
        catalog.cohort.checkpoints.push(u32::MAX);

        let warnings = catalog.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("weeks_back 20000000"));
        assert!(warnings[1].contains("checkpoint 4294967295"));
    }

    #[test]
    fn test_unknown_funnel_event_is_a_warning() {
        let mut catalog = MetricCatalog::default();
        catalog.funnels[0].steps.push(step("checkout_completed", "Checkout"));

        let warnings = catalog.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("checkout_completed"));
    }

    #[test]
    fn test_load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let catalog = MetricCatalog::default();
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(serde_json::to_string_pretty(&catalog).unwrap().as_bytes()).unwrap();

        let loaded = MetricCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_optional_sections_default() {
        let json = r#"{
            "version": 2,
            "features": [],
            "funnels": [],
            "segments": [{"min_events": 0, "label": "Everyone"}],
            "segment_value_key": "savings",
            "new_vs_returning": {"marker_event": "m", "new_flag": "n", "returning_flag": "r"},
            "cohort": {"weeks_back": 4, "checkpoints": [1]}
        }"#;

        let catalog: MetricCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.weekly_special_event, None);
        assert!(catalog.session_stages.is_empty());
        assert!(catalog.conversions.is_empty());
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MetricCatalog::load(dir.path().join("missing.json")),
            Err(CatalogError::Io(_))
        ));

        let path = dir.path().join("bad.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(MetricCatalog::load(&path), Err(CatalogError::Parse(_))));
    }
}
