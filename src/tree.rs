//! Recursive mirror and structural verification of a remote directory tree.
//!
//! Both walkers follow the remote listing order. Listings are fetched fresh on
//! every visit.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

use crate::error::MirrorError;
use crate::layout::{directory_name_from_url, ensure_dir};
use crate::listing::{DirectoryLister, NavigationFilter};
use crate::remote::RemoteSource;

/// What a mirror does after the first failure inside a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalPolicy {
    /// Stop the whole traversal at the first error.
    #[default]
    Abort,
    /// Keep mirroring sibling subtrees and collect every error.
    Continue,
}

#[derive(Debug, Default)]
pub struct MirrorReport {
    pub files: Vec<Utf8PathBuf>,
    pub errors: Vec<MirrorError>,
}

impl MirrorReport {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// Collapses the report to the first error, if any.
    pub fn into_result(self) -> Result<Vec<Utf8PathBuf>, MirrorError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.files),
        }
    }
}

pub struct TreeMirror<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    lister: DirectoryLister<'a, R>,
    policy: TraversalPolicy,
}

impl<'a, R: RemoteSource + ?Sized> TreeMirror<'a, R> {
    pub fn new(remote: &'a R, filter: NavigationFilter, policy: TraversalPolicy) -> Self {
        Self {
            remote,
            lister: DirectoryLister::new(remote, filter),
            policy,
        }
    }

    /// Downloads every file below `remote_url` into `local_dir`, creating one
    /// local directory per remote sub-directory. Files are always fetched,
    /// even when a local copy already exists. Nothing written before a
    /// failure is removed.
    pub fn mirror(&self, remote_url: &str, local_dir: &Utf8Path) -> MirrorReport {
        let mut report = MirrorReport::default();
        self.mirror_into(remote_url, local_dir, &mut report);
        report
    }

    // Returns false once the traversal has to stop.
    fn mirror_into(&self, url: &str, local_dir: &Utf8Path, report: &mut MirrorReport) -> bool {
        let entries = match self.lister.list(url) {
            Ok(entries) => entries,
            Err(err) => return self.record(report, err),
        };

        for entry in entries {
            if entry.is_directory {
                let subdir = match directory_name_from_url(&entry.url) {
                    Ok(name) => local_dir.join(name),
                    Err(err) => {
                        if self.record(report, err) {
                            continue;
                        }
                        return false;
                    }
                };
                if let Err(err) = ensure_dir(&subdir) {
                    if self.record(report, err) {
                        continue;
                    }
                    return false;
                }
                if !self.mirror_into(&entry.url, &subdir, report) {
                    return false;
                }
            } else {
                match self.remote.download(&entry.url, local_dir) {
                    Ok(path) => {
                        debug!(path = %path, "downloaded");
                        report.files.push(path);
                    }
                    Err(err) => {
                        if !self.record(report, err) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    fn record(&self, report: &mut MirrorReport, err: MirrorError) -> bool {
        warn!(error = %err, "mirror step failed");
        report.errors.push(err);
        self.policy == TraversalPolicy::Continue
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub ok: bool,
    pub missing_dirs: Vec<Utf8PathBuf>,
    pub missing_files: Vec<Utf8PathBuf>,
}

pub struct TreeVerifier<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    lister: DirectoryLister<'a, R>,
}

impl<'a, R: RemoteSource + ?Sized> TreeVerifier<'a, R> {
    pub fn new(remote: &'a R, filter: NavigationFilter) -> Self {
        Self {
            remote,
            lister: DirectoryLister::new(remote, filter),
        }
    }

    /// Checks that every remote directory and file name below `remote_url`
    /// exists under `local_dir`. File names are resolved the same way a
    /// download names them. A missing directory ends the check of its
    /// level at once; missing files are collected and siblings still checked.
    pub fn verify(&self, remote_url: &str, local_dir: &Utf8Path) -> Result<VerifyReport, MirrorError> {
        let mut report = VerifyReport {
            ok: true,
            missing_dirs: Vec::new(),
            missing_files: Vec::new(),
        };
        report.ok = self.verify_into(remote_url, local_dir, &mut report)?;
        Ok(report)
    }

    fn verify_into(
        &self,
        url: &str,
        local_dir: &Utf8Path,
        report: &mut VerifyReport,
    ) -> Result<bool, MirrorError> {
        let mut result = true;
        for entry in self.lister.list(url)? {
            if entry.is_directory {
                let subdir = local_dir.join(directory_name_from_url(&entry.url)?);
                if !subdir.as_std_path().is_dir() {
                    debug!(dir = %subdir, "missing directory");
                    report.missing_dirs.push(subdir);
                    return Ok(false);
                }
                let subtree_ok = self.verify_into(&entry.url, &subdir, report)?;
                result = result && subtree_ok;
            } else {
                let path = local_dir.join(self.remote.resolve_name(&entry.url)?);
                let present = path.as_std_path().is_file();
                if !present {
                    debug!(file = %path, "missing file");
                    report.missing_files.push(path);
                }
                result = result && present;
            }
        }
        Ok(result)
    }
}
