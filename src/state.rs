use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::AccessionNumber;
use crate::error::MirrorError;

pub const STATE_FILE_NAME: &str = "state.json";

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    schema_version: u32,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    datasets: BTreeSet<String>,
}

/// Persisted set of accession numbers whose mirror completed.
///
/// The whole set is read and rewritten on every update. Updates go through
/// one mutex, so workers sharing a store never overwrite each other's
/// records.
#[derive(Debug)]
pub struct StateStore {
    path: Utf8PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Store kept next to the running executable.
    pub fn beside_executable() -> Result<Self, MirrorError> {
        let exe = std::env::current_exe()
            .map_err(|err| MirrorError::State(format!("locate executable: {err}")))?;
        let path = Utf8PathBuf::from_path_buf(exe.with_file_name(STATE_FILE_NAME))
            .map_err(|_| MirrorError::State("non-utf8 executable path".to_string()))?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Reads the full set. A store that was never written is empty.
    pub fn load(&self) -> Result<BTreeSet<String>, MirrorError> {
        let _guard = self.guard()?;
        self.read()
    }

    /// Overwrites the stored set and returns it.
    pub fn save(&self, datasets: BTreeSet<String>) -> Result<BTreeSet<String>, MirrorError> {
        let _guard = self.guard()?;
        self.write_if_changed(&datasets)?;
        Ok(datasets)
    }

    /// Adds one accession number with a locked read-modify-write.
    pub fn record(&self, accession: &AccessionNumber) -> Result<BTreeSet<String>, MirrorError> {
        let _guard = self.guard()?;
        let mut datasets = self.read()?;
        datasets.insert(accession.as_str().to_string());
        self.write_if_changed(&datasets)?;
        debug!(accession = %accession, total = datasets.len(), "recorded completed dataset");
        Ok(datasets)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>, MirrorError> {
        self.lock
            .lock()
            .map_err(|_| MirrorError::State("state lock poisoned".to_string()))
    }

    fn read(&self) -> Result<BTreeSet<String>, MirrorError> {
        let content = match fs::read_to_string(self.path.as_std_path()) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => return Err(MirrorError::State(format!("read {}: {err}", self.path))),
        };
        let file: StateFile = serde_json::from_str(&content)
            .map_err(|err| MirrorError::State(format!("parse {}: {err}", self.path)))?;
        Ok(file.datasets)
    }

    fn write_if_changed(&self, datasets: &BTreeSet<String>) -> Result<(), MirrorError> {
        if self.path.as_std_path().exists() && self.read()? == *datasets {
            return Ok(());
        }
        if !self.path.as_std_path().exists() && datasets.is_empty() {
            return Ok(());
        }
        self.write(datasets)
    }

    fn write(&self, datasets: &BTreeSet<String>) -> Result<(), MirrorError> {
        let parent = self
            .path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| MirrorError::State(format!("create {parent}: {err}")))?;

        let file = StateFile {
            schema_version: SCHEMA_VERSION,
            updated_at: Some(chrono::Utc::now().to_rfc3339()),
            datasets: datasets.clone(),
        };
        let content = serde_json::to_vec_pretty(&file)
            .map_err(|err| MirrorError::State(err.to_string()))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".state")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| MirrorError::State(err.to_string()))?;
        temp.write_all(&content)
            .map_err(|err| MirrorError::State(err.to_string()))?;
        temp.persist(self.path.as_std_path())
            .map_err(|err| MirrorError::State(format!("persist {}: {err}", self.path)))?;
        Ok(())
    }
}
