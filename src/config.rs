use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RepairConfig {
    pub store: StoreConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    pub db_path: String,
    #[serde(default = "default_tree")]
    pub tree: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
    pub level: String,
}

fn default_tree() -> String {
    "channeldb".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                db_path: "./data/payments".to_string(),
                tree: default_tree(),
            },
            log: LogConfig::default(),
        }
    }
}

impl RepairConfig {
    pub fn parse(s: &str) -> crate::error::Result<Self> {
        toml::from_str(s).map_err(|e| crate::error::RepairError::Config(e.to_string()))
    }

    /// Loads `path`, falling back to defaults when it is missing or invalid.
    /// Logging is not up yet at this point, so problems go to stderr.
    pub fn load_or_default(path: &str) -> Self {
        if !std::path::Path::new(path).exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(s) => match Self::parse(&s) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error parsing config: {}. Using Defaults.", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Error reading config: {}. Using Defaults.", e);
                Self::default()
            }
        }
    }
}
