use std::collections::HashSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::domain::DatasetDescriptor;
use crate::error::MirrorError;
use crate::remote::RemoteSource;

pub const DEFAULT_INDEX_URL: &str =
    "https://www.ncei.noaa.gov/data/oceans/ncei/ocads/ocads_metadata.json";
pub const DEFAULT_DATA_URL: &str = "https://www.ncei.noaa.gov/data/oceans/ncei/ocads/data/";
pub const INDEX_FILE_NAME: &str = "ocads_metadata.json";

#[derive(Debug, Clone)]
pub struct MetadataIndex {
    raw: String,
    descriptors: Vec<DatasetDescriptor>,
}

impl MetadataIndex {
    pub fn parse(raw: String) -> Result<Self, MirrorError> {
        let records: Vec<DatasetDescriptor> =
            serde_json::from_str(&raw).map_err(|err| MirrorError::IndexParse(err.to_string()))?;

        let mut seen = HashSet::new();
        let mut descriptors = Vec::with_capacity(records.len());
        for record in records {
            if seen.insert(record.accession_number.clone()) {
                descriptors.push(record);
            } else {
                warn!(accession = %record.accession_number, "duplicate index entry ignored");
            }
        }
        Ok(Self { raw, descriptors })
    }

    pub fn descriptors(&self) -> &[DatasetDescriptor] {
        &self.descriptors
    }

    /// Keeps a copy of the index as fetched for this run.
    pub fn write_snapshot(&self, output_dir: &Utf8Path) -> Result<Utf8PathBuf, MirrorError> {
        fs::create_dir_all(output_dir.as_std_path())
            .map_err(|err| MirrorError::Filesystem(format!("create {output_dir}: {err}")))?;
        let path = output_dir.join(INDEX_FILE_NAME);
        fs::write(path.as_std_path(), self.raw.as_bytes())
            .map_err(|err| MirrorError::Filesystem(format!("write {path}: {err}")))?;
        Ok(path)
    }
}

/// Fetches and parses the metadata index. Every failure here is fatal for
/// the run.
pub fn fetch_index<R: RemoteSource + ?Sized>(
    remote: &R,
    url: &str,
) -> Result<MetadataIndex, MirrorError> {
    let raw = remote.fetch_text(url).map_err(|err| match err {
        MirrorError::FetchStatus { status, url } => MirrorError::IndexStatus {
            status,
            message: url,
        },
        other => MirrorError::IndexHttp(other.to_string()),
    })?;
    let index = MetadataIndex::parse(raw)?;
    info!(url, datasets = index.descriptors().len(), "loaded metadata index");
    Ok(index)
}
