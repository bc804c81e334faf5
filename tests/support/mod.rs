#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use walkdir::WalkDir;

use ocads_mirror::aggregate::MirrorSettings;
use ocads_mirror::domain::DatasetDescriptor;
use ocads_mirror::error::MirrorError;
use ocads_mirror::layout::resolve_file_name;
use ocads_mirror::listing::NavigationFilter;
use ocads_mirror::remote::RemoteSource;
use ocads_mirror::tree::TraversalPolicy;

pub const DATA_URL: &str = "https://example.org/ocads/data/";
pub const META_URL: &str = "https://example.org/ocads/metadata/";

/// In-memory stand-in for the OCADS web server.
#[derive(Default)]
pub struct MockRemote {
    pages: HashMap<String, String>,
    files: HashMap<String, Vec<u8>>,
    names: HashMap<String, String>,
    failing: HashSet<String>,
    fetches: Mutex<Vec<String>>,
    downloads: Mutex<Vec<String>>,
    lookups: Mutex<Vec<String>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves an Apache-style index page at `url` listing `entries`.
    pub fn with_listing(mut self, url: &str, entries: &[&str]) -> Self {
        self.pages.insert(url.to_string(), apache_listing(entries));
        self
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_file(mut self, url: &str, body: &[u8]) -> Self {
        self.files.insert(url.to_string(), body.to_vec());
        self
    }

    /// Serves `body` at `url` with a content-disposition style name hint.
    pub fn with_named_file(mut self, url: &str, name: &str, body: &[u8]) -> Self {
        self.names.insert(url.to_string(), name.to_string());
        self.with_file(url, body)
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.fetches().len() + self.downloads().len() + self.lookups().len()
    }
}

impl RemoteSource for MockRemote {
    fn fetch_text(&self, url: &str) -> Result<String, MirrorError> {
        self.fetches.lock().unwrap().push(url.to_string());
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| MirrorError::FetchStatus {
                url: url.to_string(),
                status: 404,
            })
    }

    fn download(&self, url: &str, output_dir: &Utf8Path) -> Result<Utf8PathBuf, MirrorError> {
        self.downloads.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(MirrorError::DownloadStatus {
                url: url.to_string(),
                status: 500,
            });
        }
        let body = self
            .files
            .get(url)
            .ok_or_else(|| MirrorError::DownloadStatus {
                url: url.to_string(),
                status: 404,
            })?;
        let name = resolve_file_name(self.names.get(url).map(String::as_str), url)?;
        let path = output_dir.join(name);
        std::fs::write(path.as_std_path(), body)
            .map_err(|err| MirrorError::Filesystem(err.to_string()))?;
        Ok(path)
    }

    fn resolve_name(&self, url: &str) -> Result<String, MirrorError> {
        self.lookups.lock().unwrap().push(url.to_string());
        resolve_file_name(self.names.get(url).map(String::as_str), url)
    }
}

pub fn apache_listing(entries: &[&str]) -> String {
    let mut html = String::from(
        "<html><head><title>Index</title></head><body><table>\n\
         <tr><th><a href=\"?C=N;O=D\">Name</a></th><th><a href=\"?C=M;O=A\">Last modified</a></th>\
         <th><a href=\"?C=S;O=A\">Size</a></th><th><a href=\"?C=D;O=A\">Description</a></th></tr>\n\
         <tr><td><a href=\"../\">Parent Directory</a></td></tr>\n",
    );
    for entry in entries {
        html.push_str(&format!("<tr><td><a href=\"{entry}\">{entry}</a></td></tr>\n"));
    }
    html.push_str("</table></body></html>\n");
    html
}

pub fn workspace() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, root)
}

pub fn settings(root: &Utf8Path) -> MirrorSettings {
    MirrorSettings {
        root: root.to_path_buf(),
        data_url: DATA_URL.to_string(),
        navigation: NavigationFilter::default(),
        traversal: TraversalPolicy::Abort,
    }
}

pub fn descriptor(accession: &str, lonlat: bool) -> DatasetDescriptor {
    DatasetDescriptor {
        accession_number: accession.parse().unwrap(),
        lonlat_url: lonlat.then(|| format!("{META_URL}{accession}_lonlat.txt")),
        iso_metadata_url: format!("{META_URL}{accession}/iso.xml"),
        ocads_metadata_url: format!("{META_URL}{accession}/ocads.xml"),
    }
}

/// Remote for a dataset shaped `data/{a.csv, sub/b.csv}` with its metadata
/// documents.
pub fn scenario_remote(remote: MockRemote, accession: &str) -> MockRemote {
    let root = format!("{DATA_URL}{accession}/");
    remote
        .with_file(&format!("{META_URL}{accession}/iso.xml"), b"<iso/>")
        .with_file(&format!("{META_URL}{accession}/ocads.xml"), b"<ocads/>")
        .with_file(&format!("{META_URL}{accession}_lonlat.txt"), b"0 0")
        .with_listing(&root, &["a.csv", "sub/"])
        .with_listing(&format!("{root}sub/"), &["b.csv"])
        .with_file(&format!("{root}a.csv"), b"a")
        .with_file(&format!("{root}sub/b.csv"), b"b")
}

/// Relative paths of every file and directory under `dir`, sorted.
pub fn tree_of(dir: &Utf8Path) -> Vec<String> {
    let mut out: Vec<String> = WalkDir::new(dir.as_std_path())
        .min_depth(1)
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative = Utf8Path::from_path(entry.path())
                .unwrap()
                .strip_prefix(dir)
                .unwrap()
                .to_string();
            if entry.file_type().is_dir() {
                format!("{relative}/")
            } else {
                relative
            }
        })
        .collect();
    out.sort();
    out
}
