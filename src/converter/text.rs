//! Line-oriented whitelist sources and intermediate list files.

use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Rejection;
use crate::{Error, Result};

/// Shape of an IPv4 address or CIDR line. Ranges are checked later by the
/// normalizer.
static IP_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}(/\d{1,2})?$").unwrap());

/// Parser for plain-text whitelist sources.
pub struct ListParser;

impl ListParser {
    /// Collect IP/CIDR candidate lines.
    pub fn parse_ips(content: &str) -> Vec<String> {
        content_lines(content)
            .filter(|line| IP_LINE.is_match(line))
            .map(str::to_string)
            .collect()
    }

    /// Collect domain candidate lines.
    ///
    /// A leading `domain:` marker and a trailing `@ads` attribute are
    /// dropped. What remains is kept if it has a dot and no whitespace.
    pub fn parse_domains(content: &str) -> Vec<String> {
        content_lines(content)
            .filter_map(|line| {
                let value = line.strip_prefix(DOMAIN_MARKER).unwrap_or(line).trim();
                let value = value.strip_suffix(ADS_MARKER).unwrap_or(value).trim();
                let keep = value.contains('.') && !value.chars().any(char::is_whitespace);
                keep.then(|| value.to_string())
            })
            .collect()
    }
}

const DOMAIN_MARKER: &str = "domain:";
const ADS_MARKER: &str = "@ads";

/// Trimmed lines that are neither blank nor comments.
fn content_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| is_content(line))
}

fn is_content(line: &str) -> bool {
    !line.is_empty() && !line.starts_with('#') && !line.starts_with("//")
}

/// Deduplicate and sort.
pub fn collect_sorted<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items
        .into_iter()
        .map(Into::into)
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Entries of a list file plus the lines that could not be decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFile {
    pub entries: Vec<String>,
    /// Lines that are not valid UTF-8
    pub rejected: Vec<Rejection>,
}

/// Read a list file: one entry per line, blank and comment lines skipped.
///
/// A line that is not valid UTF-8 becomes an encoding [`Rejection`] and
/// reading continues. Fails with [`Error::MissingInputFile`] if the file
/// does not exist.
pub fn read_list(path: &Path) -> Result<ListFile> {
    if !path.exists() {
        return Err(Error::MissingInputFile(path.to_path_buf()));
    }

    let mut list = ListFile::default();
    let reader = BufReader::new(fs::File::open(path)?);
    for (index, raw) in reader.split(b'\n').enumerate() {
        match String::from_utf8(raw?) {
            Ok(line) => {
                let line = line.trim();
                if is_content(line) {
                    list.entries.push(line.to_string());
                }
            }
            Err(e) => {
                let lossy = String::from_utf8_lossy(e.as_bytes()).trim().to_string();
                let rejection = Rejection::encoding(
                    &lossy,
                    format!(
                        "line {} is not valid UTF-8 (byte {})",
                        index + 1,
                        e.utf8_error().valid_up_to()
                    ),
                );
                log::warn!("{:?}: skipping {}", path, rejection);
                list.rejected.push(rejection);
            }
        }
    }
    Ok(list)
}

/// Write one entry per line.
pub fn write_list<S: AsRef<str>>(path: &Path, items: &[S]) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    for item in items {
        writeln!(out, "{}", item.as_ref())?;
    }
    out.flush()?;
    Ok(())
}

/// Write domains in v2fly `domain-list-community` format with a header.
pub fn write_v2fly_list<S: AsRef<str>>(path: &Path, category: &str, domains: &[S]) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "# {}", category)?;
    writeln!(out, "# Total domains: {}", domains.len())?;
    writeln!(out)?;
    for domain in domains {
        writeln!(out, "domain:{}", domain.as_ref())?;
    }
    out.flush()?;
    Ok(())
}
