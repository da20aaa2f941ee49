//! End-to-end runs: fetch sources, collect whitelists, build databases.
//!
//! Building is all-or-nothing. Both databases are merged and verified in
//! memory, staged as temp files in the output directory, and only then
//! renamed into place. If a rename fails, outputs already replaced are
//! restored from backups taken just before.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::{NamedTempFile, TempPath};

use crate::config::{CategoryConfig, Config};
use crate::converter::{collect_sorted, read_list, write_list, write_v2fly_list, ListParser};
use crate::error::Rejection;
use crate::normalize::{normalize_domains, normalize_ips};
use crate::proto::{
    AppendMerger, CategoryEntry, CategoryStats, DatabaseKind, FieldReader, LeafRecord,
    MergeOutput, TopLevelFraming,
};
use crate::remote::{AssetDownloader, GitHubClient};
use crate::{Error, Result};

const KINDS: [DatabaseKind; 2] = [DatabaseKind::GeoIp, DatabaseKind::GeoSite];

// ============================================================================
// Fetch
// ============================================================================

/// Download the original databases named in `config`.
///
/// Returns the kinds whose file changed on disk.
pub fn fetch_databases(client: &GitHubClient, config: &Config, force: bool) -> Result<Vec<DatabaseKind>> {
    let downloader = AssetDownloader::new(&config.paths.downloads, config.refresh_interval())?;
    let mut changed = Vec::new();
    for kind in KINDS {
        let source = config.asset_for(kind);
        let asset = client.latest_release_asset(&source.repo, &source.asset)?;
        if downloader.download(&asset.browser_download_url, kind.file_name(), force)? {
            changed.push(kind);
        }
    }
    Ok(changed)
}

// ============================================================================
// Collect
// ============================================================================

/// One list file written by [`collect_whitelist`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedList {
    pub kind: DatabaseKind,
    pub category: String,
    pub path: PathBuf,
    pub entries: usize,
}

/// Fetch every configured whitelist directory and write sorted, deduplicated
/// list files into the data directory.
pub fn collect_whitelist(client: &GitHubClient, config: &Config) -> Result<Vec<CollectedList>> {
    let whitelist = &config.sources.whitelist;
    let mut staged = Vec::new();

    for kind in KINDS {
        for category in config.categories_for(kind) {
            log::info!("=== Processing {} ({}) ===", category.name, category.source);
            let files = client.fetch_directory(&whitelist.repo, &whitelist.branch, &category.source)?;

            let mut candidates = Vec::new();
            for (name, content) in &files {
                let found = match kind {
                    DatabaseKind::GeoIp => ListParser::parse_ips(content),
                    DatabaseKind::GeoSite => ListParser::parse_domains(content),
                };
                log::info!("  {}: {} entries", name, found.len());
                candidates.extend(found);
            }

            let entries = collect_sorted(candidates);
            if entries.is_empty() {
                return Err(Error::MissingSourceData(format!(
                    "{} yielded no entries from {}",
                    category.name, category.source
                )));
            }
            log::info!("Total {}: {}", category.name, entries.len());
            staged.push((kind, category, entries));
        }
    }

    fs::create_dir_all(&config.paths.data)?;
    let mut lists = Vec::with_capacity(staged.len());
    for (kind, category, entries) in staged {
        let path = config.list_path(category);
        match kind {
            DatabaseKind::GeoIp => write_list(&path, &entries)?,
            DatabaseKind::GeoSite => write_v2fly_list(&path, &category.name, &entries)?,
        }
        log::info!("Saved to: {:?}", path);
        lists.push(CollectedList {
            kind,
            category: category.name.clone(),
            path,
            entries: entries.len(),
        });
    }
    Ok(lists)
}

// ============================================================================
// Build
// ============================================================================

/// Result of building one database.
#[derive(Debug, Clone)]
pub struct DatabaseSummary {
    pub kind: DatabaseKind,
    pub framing: TopLevelFraming,
    pub output_path: PathBuf,
    pub original_len: usize,
    pub output_len: usize,
    pub categories: Vec<CategoryStats>,
    pub rejections: Vec<Rejection>,
    /// Hex SHA-256 of the output file
    pub sha256: String,
}

/// Result of [`build_databases`].
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub databases: Vec<DatabaseSummary>,
}

impl BuildSummary {
    pub fn rejection_count(&self) -> usize {
        self.databases.iter().map(|d| d.rejections.len()).sum()
    }
}

impl fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for db in &self.databases {
            writeln!(
                f,
                "{}: {} -> {} bytes ({:?})",
                db.output_path.display(),
                db.original_len,
                db.output_len,
                db.framing
            )?;
            for category in &db.categories {
                writeln!(
                    f,
                    "  + {}: {} records, {} bytes",
                    category.code, category.records, category.bytes
                )?;
            }
            if !db.rejections.is_empty() {
                writeln!(f, "  ! {} entries rejected", db.rejections.len())?;
            }
        }
        write!(f, "Total rejected: {}", self.rejection_count())
    }
}

/// Merge every configured category into its database and write the outputs.
pub fn build_databases(config: &Config) -> Result<BuildSummary> {
    let mut planned = Vec::with_capacity(KINDS.len());
    for kind in KINDS {
        planned.push(plan_database(config, kind)?);
    }

    fs::create_dir_all(&config.paths.output)?;

    // Databases first, then their checksums.
    let mut staged = Vec::with_capacity(planned.len() * 2);
    for (summary, bytes) in &planned {
        staged.push((stage(&config.paths.output, bytes)?, summary.output_path.clone()));
    }
    for (summary, _) in &planned {
        let checksum = format!("{}  {}\n", summary.sha256, summary.kind.file_name());
        staged.push((
            stage(&config.paths.output, checksum.as_bytes())?,
            checksum_path(&summary.output_path),
        ));
    }
    commit(staged)?;

    let databases = planned.into_iter().map(|(summary, _)| summary).collect();
    Ok(BuildSummary { databases })
}

/// Read, normalize, merge and verify one database without writing anything.
fn plan_database(config: &Config, kind: DatabaseKind) -> Result<(DatabaseSummary, Vec<u8>)> {
    let original_path = config.original_path(kind);
    if !original_path.exists() {
        return Err(Error::MissingInputFile(original_path));
    }
    let original = fs::read(&original_path)?;
    log::info!("Reading original {}: {} bytes", kind.file_name(), original.len());

    let mut entries = Vec::new();
    let mut rejections = Vec::new();
    for category in config.categories_for(kind) {
        let (entry, rejected) = load_category(config, kind, category)?;
        rejections.extend(rejected);
        entries.push(entry);
    }

    let framing = config.framing_for(kind);
    let out = AppendMerger::new(kind).with_framing(framing).merge(&original, &entries)?;
    verify_appended(&out, &entries, framing)?;
    rejections.extend(out.rejections.iter().cloned());

    let sha256 = hex_digest(&out.bytes);
    log::info!(
        "{}: {} -> {} bytes (+{})",
        kind.file_name(),
        out.original_len,
        out.bytes.len(),
        out.appended_len()
    );

    let summary = DatabaseSummary {
        kind,
        framing,
        output_path: config.output_path(kind),
        original_len: out.original_len,
        output_len: out.bytes.len(),
        categories: out.categories,
        rejections,
        sha256,
    };
    Ok((summary, out.bytes))
}

/// Read and normalize the list file of one category.
fn load_category(
    config: &Config,
    kind: DatabaseKind,
    category: &CategoryConfig,
) -> Result<(CategoryEntry, Vec<Rejection>)> {
    let list = read_list(&config.list_path(category))?;
    log::info!("Reading {} entries: {}", category.name, list.entries.len());

    let mut rejected = list.rejected;
    let records: Vec<LeafRecord> = match kind {
        DatabaseKind::GeoIp => {
            let n = normalize_ips(&list.entries);
            rejected.extend(n.rejected);
            n.accepted.into_iter().map(LeafRecord::from).collect()
        }
        DatabaseKind::GeoSite => {
            let n = normalize_domains(&list.entries);
            rejected.extend(n.rejected);
            n.accepted.into_iter().map(LeafRecord::from).collect()
        }
    };

    if records.is_empty() {
        return Err(Error::MissingSourceData(format!(
            "{} has no valid entries in {:?}",
            category.name,
            config.list_path(category)
        )));
    }
    Ok((CategoryEntry::with_records(&category.name, records), rejected))
}

/// Check that the appended tail reads back as the expected number of
/// top-level fields. The original bytes are not read.
fn verify_appended(out: &MergeOutput, entries: &[CategoryEntry], framing: TopLevelFraming) -> Result<()> {
    let expected: usize = match framing {
        TopLevelFraming::Wrapped => entries.len(),
        TopLevelFraming::Bare => out.categories.iter().map(|c| 1 + c.records).sum(),
    };

    let mut found = 0;
    for field in FieldReader::at(&out.bytes, out.original_len) {
        field.map_err(|e| Error::Verification(e.to_string()))?;
        found += 1;
    }

    if found != expected {
        return Err(Error::Verification(format!(
            "expected {} appended fields, read back {}",
            expected, found
        )));
    }
    Ok(())
}

/// A target replaced by [`commit`], with the file it replaced.
struct Replaced {
    path: PathBuf,
    backup: Option<TempPath>,
}

/// Move every staged file onto its target.
///
/// Existing targets are first moved aside. If any step fails, targets
/// already replaced get their previous content back (or are removed if
/// they did not exist) before the error is returned. Backups are deleted
/// once every target is in place.
fn commit(staged: Vec<(NamedTempFile, PathBuf)>) -> Result<()> {
    let mut replaced: Vec<Replaced> = Vec::with_capacity(staged.len());
    for (temp, path) in staged {
        match replace(temp, &path) {
            Ok(backup) => {
                log::debug!("Wrote {:?}", path);
                replaced.push(Replaced { path, backup });
            }
            Err(e) => {
                log::error!("Failed to write {:?}: {}", path, e);
                roll_back(replaced);
                return Err(e);
            }
        }
    }
    Ok(())
}

fn replace(temp: NamedTempFile, path: &Path) -> Result<Option<TempPath>> {
    let backup = if path.exists() {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let backup = tempfile::Builder::new()
            .prefix(".backup")
            .tempfile_in(dir)?
            .into_temp_path();
        fs::rename(path, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = temp.persist(path) {
        if let Some(backup) = backup {
            if let Err(restore) = backup.persist(path) {
                log::error!("Failed to restore {:?}: {}", path, restore.error);
            }
        }
        return Err(Error::Io(e.error));
    }
    Ok(backup)
}

fn roll_back(replaced: Vec<Replaced>) {
    for Replaced { path, backup } in replaced.into_iter().rev() {
        let restored = match backup {
            Some(backup) => backup.persist(&path).map_err(|e| e.error),
            None => fs::remove_file(&path),
        };
        match restored {
            Ok(()) => log::warn!("Rolled back {:?}", path),
            Err(e) => log::error!("Failed to roll back {:?}: {}", path, e),
        }
    }
}

fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    Ok(temp)
}

/// `<output>.sha256sum`
pub fn checksum_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".sha256sum");
    PathBuf::from(name)
}

/// Lowercase hex SHA-256 of `data`.
pub fn hex_digest(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{:02x}", b)).collect()
}
