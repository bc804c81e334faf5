use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use tracing::debug;

use crate::error::MirrorError;
use crate::layout::with_trailing_slash;
use crate::remote::RemoteSource;

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']*)["']"#).expect("static regex")
});

/// Leading links of an Apache index page: four column-sort links plus
/// "Parent Directory".
pub const DEFAULT_NAVIGATION_LINKS: usize = 5;

/// How navigation chrome is told apart from real entries on a listing page.
///
/// Whichever filter is used, an entry must resolve strictly beneath the listed
/// directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationFilter {
    /// Drop a fixed number of leading links.
    SkipLeading(usize),
    /// Drop links that look like sorting, anchors, parents or absolute paths.
    Heuristic,
}

impl Default for NavigationFilter {
    fn default() -> Self {
        NavigationFilter::SkipLeading(DEFAULT_NAVIGATION_LINKS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub url: String,
    pub is_directory: bool,
}

pub struct DirectoryLister<'a, R: RemoteSource + ?Sized> {
    remote: &'a R,
    filter: NavigationFilter,
}

impl<'a, R: RemoteSource + ?Sized> DirectoryLister<'a, R> {
    pub fn new(remote: &'a R, filter: NavigationFilter) -> Self {
        Self { remote, filter }
    }

    /// Fetches the listing at `url`. Results are never cached.
    pub fn list(&self, url: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let html = self.remote.fetch_text(url)?;
        let entries = parse_listing(&html, url, self.filter)?;
        debug!(url, entries = entries.len(), "listed directory");
        Ok(entries)
    }
}

/// Extracts the entries of an HTML directory listing in document order.
pub fn parse_listing(
    html: &str,
    url: &str,
    filter: NavigationFilter,
) -> Result<Vec<RemoteEntry>, MirrorError> {
    let base_str = with_trailing_slash(url);
    let base =
        Url::parse(&base_str).map_err(|err| MirrorError::InvalidUrl(format!("{url}: {err}")))?;

    let hrefs = HREF
        .captures_iter(html)
        .filter_map(|captures| captures.get(1))
        .map(|href| href.as_str().replace("&amp;", "&"));

    let hrefs: Vec<String> = match filter {
        NavigationFilter::SkipLeading(count) => hrefs.skip(count).collect(),
        NavigationFilter::Heuristic => hrefs.filter(|href| !is_navigation(href)).collect(),
    };

    let mut entries = Vec::with_capacity(hrefs.len());
    for href in hrefs {
        let joined = base
            .join(&href)
            .map_err(|err| MirrorError::InvalidUrl(format!("{href}: {err}")))?;
        if !is_beneath(&base, &joined) {
            debug!(href = %href, "dropping link outside the listed directory");
            continue;
        }
        entries.push(RemoteEntry {
            is_directory: joined.path().ends_with('/'),
            url: joined.to_string(),
        });
    }
    Ok(entries)
}

fn is_beneath(base: &Url, joined: &Url) -> bool {
    joined.origin() == base.origin()
        && joined.path() != base.path()
        && joined.path().starts_with(base.path())
}

fn is_navigation(href: &str) -> bool {
    let href = href.trim();
    href.is_empty()
        || href.starts_with('?')
        || href.starts_with('#')
        || href.starts_with('/')
        || href.starts_with("../")
        || href == ".."
        || href.starts_with("mailto:")
}
