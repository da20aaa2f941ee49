//! Metadata stored next to downloaded source databases.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::Result;

/// When and from where a source file was last fetched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FetchMetadata {
    #[serde(with = "system_time_serde")]
    pub last_updated: Option<SystemTime>,
    pub url: Option<String>,
    pub etag: Option<String>,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl FetchMetadata {
    /// Metadata for a fetch that just completed.
    pub fn now(url: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            last_updated: Some(SystemTime::now()),
            url: Some(url.into()),
            etag,
        }
    }

    /// Path of the metadata file belonging to `file`: `<file>.meta`.
    pub fn path_for(file: &Path) -> PathBuf {
        let mut name = file.as_os_str().to_owned();
        name.push(".meta");
        PathBuf::from(name)
    }

    /// Load metadata from a file.
    ///
    /// Returns default metadata if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save metadata to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check if a refetch is due.
    ///
    /// True when nothing was recorded, when the source URL changed, or when
    /// `interval` has elapsed since the last fetch.
    pub fn needs_update(&self, url: &str, interval: Duration) -> bool {
        if self.url.as_deref() != Some(url) {
            return true;
        }
        match self.last_updated {
            None => true,
            Some(last) => {
                let elapsed = SystemTime::now().duration_since(last).unwrap_or(Duration::MAX);
                elapsed >= interval
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const URL: &str = "https://example.com/geoip.dat";

    #[test]
    fn test_metadata_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("geoip.dat.meta");
        let meta = FetchMetadata::now(URL, Some("abc123".to_string()));
        meta.save(&path).unwrap();

        let loaded = FetchMetadata::load(&path).unwrap();
        assert!(loaded.last_updated.is_some());
        assert_eq!(loaded.url.as_deref(), Some(URL));
        assert_eq!(loaded.etag, Some("abc123".to_string()));
    }

    #[test]
    fn test_metadata_needs_update() {
        let meta = FetchMetadata {
            last_updated: Some(SystemTime::now() - Duration::from_secs(3600)),
            url: Some(URL.to_string()),
            etag: None,
        };
        // 1h ago, 30min interval -> needs update
        assert!(meta.needs_update(URL, Duration::from_secs(1800)));
        // 1h ago, 2h interval -> doesn't need update
        assert!(!meta.needs_update(URL, Duration::from_secs(7200)));
        // different source always refetches
        assert!(meta.needs_update("https://mirror.example.com/geoip.dat", Duration::from_secs(7200)));
    }

    #[test]
    fn test_metadata_missing_file() {
        let loaded = FetchMetadata::load("/nonexistent/path.meta");
        assert!(loaded.is_ok());
        assert!(loaded.unwrap().last_updated.is_none());
    }

    #[test]
    fn test_metadata_default_needs_update() {
        let meta = FetchMetadata::default();
        assert!(meta.needs_update(URL, Duration::from_secs(1)));
    }

    #[test]
    fn test_metadata_path_for() {
        assert_eq!(
            FetchMetadata::path_for(Path::new("downloads/geoip.dat")),
            PathBuf::from("downloads/geoip.dat.meta")
        );
    }
}
