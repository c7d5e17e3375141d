//! Monitor settings

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use extplane_client::ClientConfig;
use extplane_protocol::{Dataref, DatarefType};
use serde::{Deserialize, Serialize};

/// A dataref to watch, as written on the command line or in settings
///
/// Text form is `<tag>:<identifier>[:<accuracy>]`, for example
/// `f:sim/flightmodel/misc/h_ind:10`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatarefSpec {
    /// Dataref identifier
    pub identifier: String,
    /// Value type
    pub kind: DatarefType,
    /// Change threshold for scalar types
    #[serde(default)]
    pub accuracy: Option<f64>,
}

impl DatarefSpec {
    /// Build a validated dataref
    pub fn to_dataref(&self) -> Result<Dataref, String> {
        let dataref = Dataref::new(self.identifier.clone(), self.kind)
            .map_err(|e| format!("{}: {}", self.identifier, e))?;
        match self.accuracy {
            Some(accuracy) => dataref
                .with_accuracy(accuracy)
                .map_err(|e| format!("{}: {}", self.identifier, e)),
            None => Ok(dataref),
        }
    }
}

impl FromStr for DatarefSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let tag = parts.next().unwrap_or_default();
        let identifier = parts
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| format!("expected <tag>:<identifier>[:<accuracy>], got {:?}", s))?;

        let kind = DatarefType::from_tag(tag).ok_or_else(|| {
            let tags: Vec<&str> = DatarefType::ALL.iter().map(|k| k.tag()).collect();
            format!("unknown type tag {:?} (expected one of {})", tag, tags.join(", "))
        })?;

        let accuracy = parts
            .next()
            .map(|a| {
                a.parse::<f64>()
                    .map_err(|e| format!("invalid accuracy {:?}: {}", a, e))
            })
            .transpose()?;

        Ok(Self {
            identifier: identifier.to_string(),
            kind,
            accuracy,
        })
    }
}

impl fmt::Display for DatarefSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.tag(), self.identifier)?;
        if let Some(accuracy) = self.accuracy {
            write!(f, ":{}", accuracy)?;
        }
        Ok(())
    }
}

/// Monitor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    /// Connection and subscription behavior
    #[serde(default)]
    pub client: ClientConfig,
    /// Datarefs subscribed on startup
    #[serde(default)]
    pub datarefs: Vec<DatarefSpec>,
    /// Log every line sent and received
    #[serde(default)]
    pub show_traffic: bool,
}

impl Settings {
    /// Get the XDG config directory for extplane-monitor
    /// Uses $XDG_CONFIG_HOME/extplane-monitor, falls back to ~/.config/extplane-monitor
    fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("extplane-monitor"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("extplane-monitor"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf, String> {
        let path =
            Self::settings_path().ok_or_else(|| "Could not determine settings path".to_string())?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a file, creating its directory
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))
    }

    /// Add a dataref unless the same identifier and type is already listed
    ///
    /// A repeated entry replaces the earlier accuracy.
    pub fn add_dataref(&mut self, spec: DatarefSpec) {
        match self
            .datarefs
            .iter_mut()
            .find(|d| d.identifier == spec.identifier && d.kind == spec.kind)
        {
            Some(existing) => existing.accuracy = spec.accuracy,
            None => self.datarefs.push(spec),
        }
    }
}
