//! Run configuration.
//!
//! Loaded from a JSON file. Every field has a default, so a missing file or an
//! empty object yields a working configuration for the upstream V2Ray rule
//! databases and the Russian whitelist repository.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::proto::{DatabaseKind, TopLevelFraming};
use crate::{Error, Result};

/// Default repository publishing `geoip.dat` and `geosite.dat` releases.
pub const DEFAULT_DATABASE_REPO: &str = "Loyalsoldier/v2ray-rules-dat";

/// Default whitelist repository.
pub const DEFAULT_WHITELIST_REPO: &str = "kirilllavrov/RU-domain-list-for-whitelist";

/// Default minimum age of a downloaded database before it is fetched again.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// A GitHub release asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSource {
    /// Repository in `owner/name` form
    pub repo: String,
    /// Asset file name in the latest release
    pub asset: String,
}

/// A branch of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSource {
    pub repo: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sources {
    pub geoip: AssetSource,
    pub geosite: AssetSource,
    pub whitelist: RepoSource,
}

impl Default for Sources {
    fn default() -> Self {
        Self {
            geoip: AssetSource {
                repo: DEFAULT_DATABASE_REPO.to_string(),
                asset: "geoip.dat".to_string(),
            },
            geosite: AssetSource {
                repo: DEFAULT_DATABASE_REPO.to_string(),
                asset: "geosite.dat".to_string(),
            },
            whitelist: RepoSource {
                repo: DEFAULT_WHITELIST_REPO.to_string(),
                branch: "main".to_string(),
            },
        }
    }
}

/// One category to append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Category code written into the database
    pub name: String,
    /// Directory in the whitelist repository holding the source files
    pub source: String,
    /// Intermediate list file name inside the data directory
    pub list: String,
}

impl CategoryConfig {
    pub fn new(name: &str, source: &str, list: &str) -> Self {
        Self {
            name: name.to_string(),
            source: source.to_string(),
            list: list.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Categories {
    pub geoip: Vec<CategoryConfig>,
    pub geosite: Vec<CategoryConfig>,
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            geoip: vec![CategoryConfig::new("WHITELIST", "IPchecked", "whitelist_ips.txt")],
            geosite: vec![
                CategoryConfig::new("WHITELIST-RU", "domains/ru", "whitelist_ru_domains.txt"),
                CategoryConfig::new("WHITELIST-ADS", "domains/ads", "whitelist_ads_domains.txt"),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Original databases
    pub downloads: PathBuf,
    /// Intermediate list files
    pub data: PathBuf,
    /// Merged databases
    pub output: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            downloads: PathBuf::from("downloads"),
            data: PathBuf::from("data"),
            output: PathBuf::from("output"),
        }
    }
}

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sources: Sources,
    pub categories: Categories,
    pub paths: Paths,
    /// Top-level framing for appended geosite categories
    pub geosite_framing: TopLevelFraming,
    /// Seconds before a downloaded database is considered stale
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Sources::default(),
            categories: Categories::default(),
            paths: Paths::default(),
            geosite_framing: DatabaseKind::GeoSite.default_framing(),
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL.as_secs(),
        }
    }
}

impl Config {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInputFile(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load a configuration file, falling back to defaults if it is absent.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Check the configuration for values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        for (label, repo) in [
            ("sources.geoip.repo", &self.sources.geoip.repo),
            ("sources.geosite.repo", &self.sources.geosite.repo),
            ("sources.whitelist.repo", &self.sources.whitelist.repo),
        ] {
            if !repo.contains('/') {
                return Err(Error::Config(format!(
                    "{} must be in owner/name form, got {:?}",
                    label, repo
                )));
            }
        }

        for kind in [DatabaseKind::GeoIp, DatabaseKind::GeoSite] {
            let categories = self.categories_for(kind);
            if categories.is_empty() {
                return Err(Error::Config(format!("no {} categories configured", kind)));
            }
            let mut seen = HashSet::new();
            for category in categories {
                if category.name.trim().is_empty() {
                    return Err(Error::Config(format!("empty {} category name", kind)));
                }
                if category.list.trim().is_empty() {
                    return Err(Error::Config(format!(
                        "{} category {} has no list file",
                        kind, category.name
                    )));
                }
                if !seen.insert(category.name.as_str()) {
                    return Err(Error::Config(format!(
                        "duplicate {} category {}",
                        kind, category.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn categories_for(&self, kind: DatabaseKind) -> &[CategoryConfig] {
        match kind {
            DatabaseKind::GeoIp => &self.categories.geoip,
            DatabaseKind::GeoSite => &self.categories.geosite,
        }
    }

    pub fn asset_for(&self, kind: DatabaseKind) -> &AssetSource {
        match kind {
            DatabaseKind::GeoIp => &self.sources.geoip,
            DatabaseKind::GeoSite => &self.sources.geosite,
        }
    }

    /// Framing used when appending to `kind`.
    pub fn framing_for(&self, kind: DatabaseKind) -> TopLevelFraming {
        match kind {
            DatabaseKind::GeoIp => TopLevelFraming::Wrapped,
            DatabaseKind::GeoSite => self.geosite_framing,
        }
    }

    /// Where the original database of `kind` is stored.
    pub fn original_path(&self, kind: DatabaseKind) -> PathBuf {
        self.paths.downloads.join(kind.file_name())
    }

    /// Where the merged database of `kind` is written.
    pub fn output_path(&self, kind: DatabaseKind) -> PathBuf {
        self.paths.output.join(kind.file_name())
    }

    /// Where the list file of `category` is stored.
    pub fn list_path(&self, category: &CategoryConfig) -> PathBuf {
        self.paths.data.join(&category.list)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sources.geoip.asset, "geoip.dat");
        assert_eq!(config.sources.whitelist.branch, "main");
        assert_eq!(config.categories.geoip[0].name, "WHITELIST");
        assert_eq!(config.categories.geosite.len(), 2);
        assert_eq!(config.framing_for(DatabaseKind::GeoIp), TopLevelFraming::Wrapped);
        assert_eq!(config.framing_for(DatabaseKind::GeoSite), TopLevelFraming::Bare);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "sources": { "whitelist": { "repo": "me/list", "branch": "dev" } },
            "paths": { "output": "dist" },
            "geosite_framing": "wrapped"
        }"#;
        let config = Config::from_json(json).unwrap();
        assert_eq!(config.sources.whitelist.repo, "me/list");
        assert_eq!(config.sources.geoip.repo, DEFAULT_DATABASE_REPO);
        assert_eq!(config.paths.output, PathBuf::from("dist"));
        assert_eq!(config.paths.data, PathBuf::from("data"));
        assert_eq!(config.framing_for(DatabaseKind::GeoSite), TopLevelFraming::Wrapped);
        assert_eq!(config.output_path(DatabaseKind::GeoSite), PathBuf::from("dist/geosite.dat"));
    }

    #[test]
    fn test_validation_errors() {
        let bad_repo = r#"{ "sources": { "geoip": { "repo": "nope", "asset": "geoip.dat" } } }"#;
        assert!(matches!(Config::from_json(bad_repo), Err(Error::Config(_))));

        let no_categories = r#"{ "categories": { "geoip": [] } }"#;
        assert!(matches!(Config::from_json(no_categories), Err(Error::Config(_))));

        let duplicate = r#"{ "categories": { "geosite": [
            { "name": "A", "source": "x", "list": "a.txt" },
            { "name": "A", "source": "y", "list": "b.txt" }
        ] } }"#;
        assert!(matches!(Config::from_json(duplicate), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Config::from_json("{"), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        assert!(matches!(Config::load(&path), Err(Error::MissingInputFile(_))));
        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_paths() {
        let config = Config::default();
        assert_eq!(
            config.original_path(DatabaseKind::GeoIp),
            PathBuf::from("downloads/geoip.dat")
        );
        assert_eq!(
            config.list_path(&config.categories.geosite[1]),
            PathBuf::from("data/whitelist_ads_domains.txt")
        );
    }
}
