use std::fs;
use std::sync::LazyLock;

use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use reqwest::Url;

use crate::domain::AccessionNumber;
use crate::error::MirrorError;

static DISPOSITION_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bfilename\s*=\s*(?:"([^"]*)"|([^;]*))"#).expect("static regex")
});

/// Local folders of one dataset: `<root>/<accession>/{metadata,data}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetLayout {
    dataset_dir: Utf8PathBuf,
    metadata_dir: Utf8PathBuf,
    data_dir: Utf8PathBuf,
}

impl DatasetLayout {
    pub fn new(root: &Utf8Path, accession: &AccessionNumber) -> Self {
        let dataset_dir = root.join(accession.as_str());
        Self {
            metadata_dir: dataset_dir.join("metadata"),
            data_dir: dataset_dir.join("data"),
            dataset_dir,
        }
    }

    pub fn dataset_dir(&self) -> &Utf8Path {
        &self.dataset_dir
    }

    pub fn metadata_dir(&self) -> &Utf8Path {
        &self.metadata_dir
    }

    pub fn data_dir(&self) -> &Utf8Path {
        &self.data_dir
    }

    pub fn exists(&self) -> bool {
        self.dataset_dir.as_std_path().is_dir()
    }

    pub fn create(&self) -> Result<(), MirrorError> {
        ensure_dir(&self.metadata_dir)?;
        ensure_dir(&self.data_dir)
    }
}

pub fn ensure_dir(path: &Utf8Path) -> Result<(), MirrorError> {
    fs::create_dir_all(path.as_std_path())
        .map_err(|err| MirrorError::Filesystem(format!("create {path}: {err}")))
}

/// Remote data folder of a dataset, always with a trailing slash so that
/// listing links resolve beneath it.
pub fn dataset_url(data_url: &str, accession: &AccessionNumber) -> Result<String, MirrorError> {
    let base = Url::parse(&with_trailing_slash(data_url))
        .map_err(|err| MirrorError::InvalidUrl(format!("{data_url}: {err}")))?;
    let joined = base
        .join(&format!("{}/", accession.as_str()))
        .map_err(|err| MirrorError::InvalidUrl(format!("{data_url}: {err}")))?;
    Ok(joined.to_string())
}

pub fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}

/// Picks the local file name for a download: the transport's hint when it
/// yields a usable name, otherwise the URL's final path segment.
pub fn resolve_file_name(hint: Option<&str>, url: &str) -> Result<String, MirrorError> {
    if let Some(name) = hint.and_then(sanitize_name) {
        return Ok(name);
    }
    file_name_from_url(url)
}

pub fn file_name_from_url(url: &str) -> Result<String, MirrorError> {
    let parsed = Url::parse(url).map_err(|_| MirrorError::Naming(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(sanitize_name)
        .ok_or_else(|| MirrorError::Naming(url.to_string()))
}

/// Name of the local sub-directory for a listing link such as
/// `https://host/data/0001/sub/`.
pub fn directory_name_from_url(url: &str) -> Result<String, MirrorError> {
    let parsed = Url::parse(url).map_err(|_| MirrorError::Naming(url.to_string()))?;
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|segment| !segment.is_empty()).next_back())
        .and_then(sanitize_name)
        .ok_or_else(|| MirrorError::Naming(url.to_string()))
}

pub fn file_name_from_disposition(header: &str) -> Option<String> {
    let captures = DISPOSITION_FILENAME.captures(header)?;
    let value = captures.get(1).or_else(|| captures.get(2))?;
    sanitize_name(value.as_str())
}

fn sanitize_name(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_end_matches(';')
        .trim()
        .trim_matches(|ch: char| ch == '"' || ch == '\'');
    let name = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
