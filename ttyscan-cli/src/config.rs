//! Configuration file support for ttyscan.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (TTYSCAN_*)
//! 3. Local config file (./ttyscan.toml)
//! 4. Global config file (~/.config/ttyscan/config.toml)

use {
    clap::ValueEnum,
    directories::ProjectDirs,
    log::{debug, warn},
    serde::{Deserialize, Serialize},
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// Local configuration file name.
pub(crate) const LOCAL_CONFIG_FILE: &str = "ttyscan.toml";

/// How `list` prints devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// JSON envelope.
    Json,
}

/// Output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct OutputConfig {
    /// Default output format.
    pub format: Option<OutputFormat>,
}

/// Device filter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct FilterConfig {
    /// Only list devices with USB metadata.
    #[serde(default)]
    pub usb_only: bool,
    /// Only list devices with one of these vendor IDs (hex).
    #[serde(default)]
    pub vendor_ids: Vec<String>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Config {
    /// Output configuration.
    #[serde(default)]
    pub output: OutputConfig,
    /// Filter configuration.
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Local config overrides global
        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_CONFIG_FILE)) {
            debug!("Loaded local config from {LOCAL_CONFIG_FILE}");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!("Could not load config from {}, using defaults", path.display());
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ttyscan").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }

        if other.filter.usb_only {
            self.filter.usb_only = true;
        }
        for vid in other.filter.vendor_ids {
            if !self.filter.vendor_ids.contains(&vid) {
                self.filter.vendor_ids.push(vid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::io::Write as _};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.output.format.is_none());
        assert!(!config.filter.usb_only);
        assert!(config.filter.vendor_ids.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            [output]
            format = "json"

            [filter]
            usb_only = true
            vendor_ids = ["0403", "10c4"]
            "#,
        )
        .unwrap();
        assert_eq!(config.output.format, Some(OutputFormat::Json));
        assert!(config.filter.usb_only);
        assert_eq!(config.filter.vendor_ids, vec!["0403", "10c4"]);
    }

    #[test]
    fn test_parse_partial_config() {
        let config: Config = toml::from_str("[filter]\nusb_only = true\n").unwrap();
        assert!(config.output.format.is_none());
        assert!(config.filter.usb_only);
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        let result: Result<Config, _> = toml::from_str("[output]\nformat = \"xml\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_merge_format_overrides() {
        let mut base = Config::default();
        base.output.format = Some(OutputFormat::Table);
        let mut other = Config::default();
        other.output.format = Some(OutputFormat::Json);

        base.merge(other);
        assert_eq!(base.output.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_config_merge_keeps_base_when_other_unset() {
        let mut base = Config::default();
        base.output.format = Some(OutputFormat::Json);
        base.filter.usb_only = true;

        base.merge(Config::default());
        assert_eq!(base.output.format, Some(OutputFormat::Json));
        assert!(base.filter.usb_only);
    }

    #[test]
    fn test_config_merge_vendor_ids_dedup() {
        let mut base = Config::default();
        base.filter.vendor_ids = vec!["0403".to_string()];
        let mut other = Config::default();
        other.filter.vendor_ids = vec!["0403".to_string(), "1a86".to_string()];

        base.merge(other);
        assert_eq!(base.filter.vendor_ids, vec!["0403", "1a86"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nformat = \"json\"").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.output.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_load_from_file_missing() {
        assert!(Config::load_from_file(Path::new("/nonexistent/ttyscan.toml")).is_none());
    }

    #[test]
    fn test_load_from_file_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output\nformat = ").unwrap();
        assert!(Config::load_from_file(file.path()).is_none());
    }

    #[test]
    fn test_load_from_path_falls_back_to_default() {
        let config = Config::load_from_path(Path::new("/nonexistent/ttyscan.toml"));
        assert!(config.output.format.is_none());
        assert!(config.filter.vendor_ids.is_empty());
    }

    #[test]
    fn test_global_config_path_ends_with_config_toml() {
        if let Some(path) = Config::global_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
