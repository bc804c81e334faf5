use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::MirrorError;

/// Identity of one dataset in the OCADS collection. Doubles as the name of
/// the dataset's local folder, so it never contains path separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessionNumber(String);

impl AccessionNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccessionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccessionNumber {
    type Err = MirrorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let is_valid = !normalized.is_empty()
            && normalized != "."
            && normalized != ".."
            && !normalized.contains(['/', '\\'])
            && !normalized.chars().any(char::is_control);
        if !is_valid {
            return Err(MirrorError::InvalidAccession(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

impl TryFrom<String> for AccessionNumber {
    type Error = MirrorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccessionNumber> for String {
    fn from(value: AccessionNumber) -> Self {
        value.0
    }
}

/// One record of the metadata index. Field names on the wire follow the
/// NCEI document exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    pub accession_number: AccessionNumber,
    #[serde(default, deserialize_with = "non_empty_url")]
    pub lonlat_url: Option<String>,
    #[serde(rename = "xml_url_iso-19115-2")]
    pub iso_metadata_url: String,
    #[serde(rename = "xml_url_ocads")]
    pub ocads_metadata_url: String,
}

impl DatasetDescriptor {
    /// Metadata documents in download order; lon/lat only when the index
    /// carries it.
    pub fn metadata_urls(&self) -> Vec<&str> {
        let mut urls = Vec::with_capacity(3);
        if let Some(lonlat) = &self.lonlat_url {
            urls.push(lonlat.as_str());
        }
        urls.push(self.iso_metadata_url.as_str());
        urls.push(self.ocads_metadata_url.as_str());
        urls
    }
}

fn non_empty_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|url| {
        let trimmed = url.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }))
}
