//! GitHub sources: release assets, directory listings and raw files.
//!
//! Text sources go through a small blocking `ureq` agent. Database assets
//! are downloaded with `reqwest`, written to a temp file and renamed into
//! place so a failed download never leaves a truncated database behind.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::metadata::FetchMetadata;
use crate::{Error, Result};

/// GitHub REST API base URL.
pub const GITHUB_API: &str = "https://api.github.com";

/// Raw file host.
pub const GITHUB_RAW: &str = "https://raw.githubusercontent.com";

/// Environment variable holding an optional GitHub token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

const USER_AGENT: &str = concat!("geodat/", env!("CARGO_PKG_VERSION"));

/// A release asset as returned by the GitHub API.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ContentItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Find `asset` in a `/releases/latest` response body.
pub fn find_release_asset(release_json: &str, asset: &str) -> Result<ReleaseAsset> {
    let release: Release = serde_json::from_str(release_json)?;
    release
        .assets
        .into_iter()
        .find(|a| a.name == asset)
        .ok_or_else(|| {
            Error::MissingSourceData(format!(
                "asset {} not found in release {:?}",
                asset, release.tag_name
            ))
        })
}

/// File names from a `/contents/{path}` response body, sorted.
pub fn parse_directory_listing(contents_json: &str) -> Result<Vec<String>> {
    let items: Vec<ContentItem> = serde_json::from_str(contents_json)?;
    let mut files: Vec<String> = items
        .into_iter()
        .filter(|item| item.kind == "file")
        .map(|item| item.name)
        .collect();
    files.sort();
    Ok(files)
}

/// Blocking client for the GitHub API and raw file host.
pub struct GitHubClient {
    agent: ureq::Agent,
    api_base: String,
    raw_base: String,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client, picking up `GITHUB_TOKEN` from the environment.
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build();
        Self {
            agent,
            api_base: GITHUB_API.to_string(),
            raw_base: GITHUB_RAW.to_string(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        }
    }

    /// Use a different API base URL.
    pub fn with_api_base(mut self, url: &str) -> Self {
        self.api_base = url.trim_end_matches('/').to_string();
        self
    }

    /// Use a different raw file host.
    pub fn with_raw_base(mut self, url: &str) -> Self {
        self.raw_base = url.trim_end_matches('/').to_string();
        self
    }

    /// Override the token.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn release_url(&self, repo: &str) -> String {
        format!("{}/repos/{}/releases/latest", self.api_base, repo)
    }

    pub fn contents_url(&self, repo: &str, path: &str, branch: &str) -> String {
        format!("{}/repos/{}/contents/{}?ref={}", self.api_base, repo, path, branch)
    }

    pub fn raw_url(&self, repo: &str, branch: &str, path: &str) -> String {
        format!("{}/{}/{}/{}", self.raw_base, repo, branch, path)
    }

    fn get_text(&self, url: &str) -> Result<String> {
        let mut request = self.agent.get(url);
        if let Some(ref token) = self.token {
            request = request.set("Authorization", &format!("token {}", token));
        }

        let response = request.call().map_err(|e| match e {
            ureq::Error::Status(code, _) => Error::Http(format!("{}: HTTP {}", url, code)),
            ureq::Error::Transport(t) => Error::Http(format!("{}: {}", url, t)),
        })?;

        response
            .into_string()
            .map_err(|e| Error::Http(format!("{}: failed to read body: {}", url, e)))
    }

    /// Download URL of `asset` in the latest release of `repo`.
    pub fn latest_release_asset(&self, repo: &str, asset: &str) -> Result<ReleaseAsset> {
        log::info!("Fetching latest release from {}...", repo);
        let body = self.get_text(&self.release_url(repo))?;
        let found = find_release_asset(&body, asset)?;
        log::debug!("Found asset {} ({} bytes)", found.name, found.size);
        Ok(found)
    }

    /// Names of the files (not directories) under `path`.
    pub fn list_directory(&self, repo: &str, path: &str, branch: &str) -> Result<Vec<String>> {
        let body = self.get_text(&self.contents_url(repo, path, branch))?;
        let files = parse_directory_listing(&body)?;
        log::info!("Found {} files in {}", files.len(), path);
        Ok(files)
    }

    /// Raw content of a single file.
    pub fn fetch_raw(&self, repo: &str, branch: &str, path: &str) -> Result<String> {
        self.get_text(&self.raw_url(repo, branch, path))
    }

    /// Content of every file under `path`, as `(file name, content)` pairs.
    ///
    /// A file that fails to download is logged and skipped. A directory
    /// with no files, or where every file failed, is an error.
    pub fn fetch_directory(&self, repo: &str, branch: &str, path: &str) -> Result<Vec<(String, String)>> {
        let files = self.list_directory(repo, path, branch)?;
        if files.is_empty() {
            return Err(Error::MissingSourceData(format!("no files in {}/{}", repo, path)));
        }

        let mut contents = Vec::with_capacity(files.len());
        for name in files {
            let file_path = format!("{}/{}", path, name);
            log::debug!("Processing {}...", file_path);
            match self.fetch_raw(repo, branch, &file_path) {
                Ok(text) => contents.push((name, text)),
                Err(e) => log::warn!("Failed to fetch {}: {}", file_path, e),
            }
        }

        if contents.is_empty() {
            return Err(Error::MissingSourceData(format!(
                "every file in {}/{} failed to download",
                repo, path
            )));
        }
        Ok(contents)
    }
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Downloads release assets into a local directory.
pub struct AssetDownloader {
    client: reqwest::blocking::Client,
    dir: PathBuf,
    refresh_interval: Duration,
}

impl AssetDownloader {
    pub fn new(dir: &Path, refresh_interval: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            dir: dir.to_path_buf(),
            refresh_interval,
        })
    }

    /// Final path of a downloaded file.
    pub fn target_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    fn temp_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!("{}.tmp", file_name))
    }

    /// Whether `file_name` must be downloaded again from `url`.
    pub fn needs_download(&self, file_name: &str, url: &str) -> bool {
        let path = self.target_path(file_name);
        if !path.exists() {
            return true;
        }
        FetchMetadata::load(FetchMetadata::path_for(&path))
            .unwrap_or_default()
            .needs_update(url, self.refresh_interval)
    }

    /// Download `url` to `file_name` unless a fresh copy exists.
    ///
    /// Sends the stored ETag so an unchanged asset costs a 304. Returns
    /// `true` if the file on disk changed.
    pub fn download(&self, url: &str, file_name: &str, force: bool) -> Result<bool> {
        fs::create_dir_all(&self.dir)?;
        let path = self.target_path(file_name);
        let meta_path = FetchMetadata::path_for(&path);

        if !force && !self.needs_download(file_name, url) {
            log::info!("{} is up to date, skipping download", file_name);
            return Ok(false);
        }

        let previous = FetchMetadata::load(&meta_path).unwrap_or_default();
        let mut request = self.client.get(url);
        if !force && path.exists() && previous.url.as_deref() == Some(url) {
            if let Some(ref etag) = previous.etag {
                request = request.header("If-None-Match", etag.as_str());
            }
        }

        log::info!("Downloading {}...", url);
        let response = request.send()?;
        if response.status() == reqwest::StatusCode::NOT_MODIFIED {
            log::info!("{} not modified (304)", file_name);
            FetchMetadata::now(url, previous.etag).save(&meta_path)?;
            return Ok(false);
        }
        let response = response.error_for_status()?;

        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let raw = response.bytes()?;

        let data = if is_gzip(&raw) {
            let mut decoder = GzDecoder::new(&raw[..]);
            let mut data = Vec::new();
            decoder.read_to_end(&mut data)?;
            log::debug!("Decompressed {} -> {} bytes", raw.len(), data.len());
            data
        } else {
            raw.to_vec()
        };

        if data.is_empty() {
            return Err(Error::MissingSourceData(format!("{} is empty", url)));
        }

        let temp_path = self.temp_path(file_name);
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        // Atomic rename
        fs::rename(&temp_path, &path)?;
        FetchMetadata::now(url, etag).save(&meta_path)?;

        log::info!("Downloaded: {:?} ({} bytes)", path, data.len());
        Ok(true)
    }
}

/// Check if data is gzip compressed.
fn is_gzip(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
}
