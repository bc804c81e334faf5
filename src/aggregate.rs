use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use crate::config::ResolvedConfig;
use crate::domain::{AccessionNumber, DatasetDescriptor};
use crate::error::MirrorError;
use crate::layout::{self, DatasetLayout};
use crate::listing::NavigationFilter;
use crate::remote::RemoteSource;
use crate::state::StateStore;
use crate::tree::{TraversalPolicy, TreeMirror, TreeVerifier, VerifyReport};

/// Where and how datasets are mirrored.
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub root: Utf8PathBuf,
    pub data_url: String,
    pub navigation: NavigationFilter,
    pub traversal: TraversalPolicy,
}

impl MirrorSettings {
    pub fn from_config(config: &ResolvedConfig, root: Utf8PathBuf) -> Self {
        Self {
            root,
            data_url: config.data_url.clone(),
            navigation: config.navigation,
            traversal: config.traversal,
        }
    }

    pub fn layout(&self, accession: &AccessionNumber) -> DatasetLayout {
        DatasetLayout::new(&self.root, accession)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateOutcome {
    /// Folder present and recorded as complete; nothing was fetched.
    Skipped,
    Mirrored {
        metadata_files: Vec<Utf8PathBuf>,
        data_files: Vec<Utf8PathBuf>,
    },
}

pub struct DatasetAggregator<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    state: &'a StateStore,
    settings: &'a MirrorSettings,
}

impl<'a, R: RemoteSource + ?Sized> DatasetAggregator<'a, R> {
    pub fn new(remote: &'a R, state: &'a StateStore, settings: &'a MirrorSettings) -> Self {
        Self {
            remote,
            state,
            settings,
        }
    }

    /// Mirrors one dataset: metadata bundle, then data tree, then the state
    /// record. Any error leaves the dataset unrecorded so the next run
    /// retries it from scratch.
    pub fn aggregate(&self, descriptor: &DatasetDescriptor) -> Result<AggregateOutcome, MirrorError> {
        let accession = &descriptor.accession_number;
        let completed = self.state.load()?;
        let layout = self.settings.layout(accession);

        if layout.exists() && completed.contains(accession.as_str()) {
            debug!(accession = %accession, "already aggregated");
            return Ok(AggregateOutcome::Skipped);
        }

        info!(accession = %accession, "downloading data and metadata");
        layout.create()?;

        let mut metadata_files = Vec::new();
        for url in descriptor.metadata_urls() {
            metadata_files.push(self.remote.download(url, layout.metadata_dir())?);
        }
        info!(accession = %accession, files = metadata_files.len(), "metadata download complete");

        let dataset_url = layout::dataset_url(&self.settings.data_url, accession)?;
        let data_files = TreeMirror::new(self.remote, self.settings.navigation, self.settings.traversal)
            .mirror(&dataset_url, layout.data_dir())
            .into_result()?;

        self.state.record(accession)?;
        info!(accession = %accession, files = data_files.len(), "dataset mirrored");

        Ok(AggregateOutcome::Mirrored {
            metadata_files,
            data_files,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub accession: AccessionNumber,
    pub folder_present: bool,
    pub missing_metadata: Vec<Utf8PathBuf>,
    pub tree: Option<VerifyReport>,
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        self.folder_present
            && self.missing_metadata.is_empty()
            && self.tree.as_ref().is_some_and(|tree| tree.ok)
    }
}

/// Read-only counterpart of [`DatasetAggregator`].
pub struct DatasetChecker<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    settings: &'a MirrorSettings,
}

impl<'a, R: RemoteSource + ?Sized> DatasetChecker<'a, R> {
    pub fn new(remote: &'a R, settings: &'a MirrorSettings) -> Self {
        Self { remote, settings }
    }

    pub fn check(&self, descriptor: &DatasetDescriptor) -> Result<CheckOutcome, MirrorError> {
        let accession = &descriptor.accession_number;
        let layout = self.settings.layout(accession);

        if !layout.exists() {
            debug!(accession = %accession, "dataset folder missing");
            return Ok(CheckOutcome {
                accession: accession.clone(),
                folder_present: false,
                missing_metadata: Vec::new(),
                tree: None,
            });
        }

        let missing_metadata = missing_metadata(self.remote, descriptor, layout.metadata_dir())?;
        let dataset_url = layout::dataset_url(&self.settings.data_url, accession)?;
        let tree = TreeVerifier::new(self.remote, self.settings.navigation)
            .verify(&dataset_url, layout.data_dir())?;

        Ok(CheckOutcome {
            accession: accession.clone(),
            folder_present: true,
            missing_metadata,
            tree: Some(tree),
        })
    }
}

fn missing_metadata<R: RemoteSource + ?Sized>(
    remote: &R,
    descriptor: &DatasetDescriptor,
    metadata_dir: &Utf8Path,
) -> Result<Vec<Utf8PathBuf>, MirrorError> {
    let mut missing = Vec::new();
    for url in descriptor.metadata_urls() {
        let path = metadata_dir.join(remote.resolve_name(url)?);
        if !path.as_std_path().is_file() {
            missing.push(path);
        }
    }
    Ok(missing)
}
