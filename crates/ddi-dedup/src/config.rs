use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyName {
    HashDropNew,
    Truncate,
}

impl StrategyName {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyName::HashDropNew => "hash-drop-new",
            StrategyName::Truncate => "truncate",
        }
    }
}

impl fmt::Display for StrategyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: StrategyName,
    #[serde(default)]
    pub device_manufacturers: Vec<String>,
}

/// Strategies in selection order; the first eligible one wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupConfig {
    pub strategies: Vec<StrategyConfig>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            strategies: vec![
                StrategyConfig {
                    name: StrategyName::Truncate,
                    device_manufacturers: vec!["Animas".to_string()],
                },
                StrategyConfig {
                    name: StrategyName::HashDropNew,
                    device_manufacturers: ["Abbott", "Dexcom", "Insulet", "LifeScan", "Medtronic", "Roche", "Tandem"]
                        .into_iter()
                        .map(String::from)
                        .collect(),
                },
            ],
        }
    }
}

impl DedupConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}
