pub mod naming;
pub mod store;

use crate::utils::nocase::{NoCaseMap, NoCaseSet};
use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const TAG_NAME: &str = "name";
pub const TAG_VERSION: &str = "version";

/// Persisted download state of one component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    /// Key of the provider that produced this state
    pub download_type: String,
    /// Identity tags; always carries the logical `name` and `version` once saved
    pub tags: NoCaseMap,
    /// Provider-private restart/idempotency state
    pub watermarks: NoCaseMap,
    /// Paths the provider wants removed on revert
    pub artifacts_to_clean: NoCaseSet,
}

impl Watermark {
    pub fn new(download_type: impl Into<String>) -> Self {
        Self {
            download_type: download_type.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.tags.get(TAG_NAME)
    }

    pub fn version(&self) -> Option<&str> {
        self.tags.get(TAG_VERSION)
    }

    /// Nothing to clean and nothing to resume from; equivalent to "not cached"
    pub fn is_empty(&self) -> bool {
        self.artifacts_to_clean.is_empty() && self.watermarks.is_empty()
    }

    pub fn get_watermark<T: FromStr>(&self, key: &str) -> Option<T> {
        self.watermarks.get(key).and_then(|v| v.parse().ok())
    }

    pub fn update_watermark(&mut self, key: impl Into<String>, value: impl ToString) {
        self.watermarks.insert(key, value.to_string());
    }

    pub fn remove_watermark(&mut self, key: &str) -> Option<String> {
        self.watermarks.remove(key)
    }

    pub fn add_artifact(&mut self, artifact: impl Into<String>) -> bool {
        self.artifacts_to_clean.insert(artifact)
    }

    pub fn remove_artifact(&mut self, artifact: &str) -> bool {
        self.artifacts_to_clean.remove(artifact)
    }

    pub fn to_xml(&self) -> Result<String> {
        let document = WatermarkDocument::encode(self);
        serde_xml_rs::to_string(&document).context("Serialize watermark document")
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let document: WatermarkDocument =
            serde_xml_rs::from_str(xml).context("Parse watermark document")?;
        document.decode()
    }
}

// On-disk shape. Element-only so ordering and key spelling survive exactly.

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename = "DownloadWatermark")]
struct WatermarkDocument {
    #[serde(rename = "DownloadType", default)]
    download_type: String,
    #[serde(rename = "Tags", default)]
    tags: EntryList,
    #[serde(rename = "Watermarks", default)]
    watermarks: EntryList,
    #[serde(rename = "ArtifactsToClean", default)]
    artifacts_to_clean: ArtifactList,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EntryList {
    #[serde(rename = "Entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value", default)]
    value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ArtifactList {
    #[serde(rename = "Artifact", default)]
    items: Vec<String>,
}

impl EntryList {
    fn encode(map: &NoCaseMap) -> Self {
        EntryList {
            entries: map
                .iter()
                .map(|(key, value)| Entry {
                    key: encode_text(key),
                    value: encode_text(value),
                })
                .collect(),
        }
    }

    fn decode(self) -> Result<NoCaseMap> {
        self.entries
            .into_iter()
            .map(|e| -> Result<(String, String)> {
                Ok((decode_text(e.key)?, decode_text(e.value)?))
            })
            .collect()
    }
}

impl WatermarkDocument {
    fn encode(watermark: &Watermark) -> Self {
        WatermarkDocument {
            download_type: encode_text(&watermark.download_type),
            tags: EntryList::encode(&watermark.tags),
            watermarks: EntryList::encode(&watermark.watermarks),
            artifacts_to_clean: ArtifactList {
                items: watermark.artifacts_to_clean.iter().map(encode_text).collect(),
            },
        }
    }

    fn decode(self) -> Result<Watermark> {
        Ok(Watermark {
            download_type: decode_text(self.download_type)?,
            tags: self.tags.decode()?,
            watermarks: self.watermarks.decode()?,
            artifacts_to_clean: self
                .artifacts_to_clean
                .items
                .into_iter()
                .map(decode_text)
                .collect::<Result<_>>()?,
        })
    }
}

/// Marks element text stored as base64
const ENCODED_PREFIX: &str = "base64:";

/// The XML reader trims element text and normalizes line breaks, so text
/// with outer whitespace or control characters is stored encoded.
fn needs_encoding(text: &str) -> bool {
    text.trim() != text || text.starts_with(ENCODED_PREFIX) || text.chars().any(char::is_control)
}

fn encode_text(text: &str) -> String {
    if needs_encoding(text) {
        format!("{}{}", ENCODED_PREFIX, BASE64.encode(text))
    } else {
        text.to_string()
    }
}

fn decode_text(text: String) -> Result<String> {
    match text.strip_prefix(ENCODED_PREFIX) {
        Some(encoded) => {
            let bytes = BASE64
                .decode(encoded)
                .with_context(|| format!("Decode watermark text '{}'", text))?;
            String::from_utf8(bytes).context("Decoded watermark text is not UTF-8")
        }
        None => Ok(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Watermark {
        let mut wm = Watermark::new("FileShareCopier");
        wm.tags.insert(TAG_NAME, "$/Proj/Lib");
        wm.tags.insert(TAG_VERSION, "C1234");
        wm.update_watermark("bin/Lib.dll", "1700000000:2048");
        wm.update_watermark("Retries", 3);
        wm.add_artifact("/work/Dependencies/bin/Lib.dll");
        wm.add_artifact("/work/Dependencies/bin/Lib & Co.pdb");
        wm
    }

    #[test]
    fn xml_round_trip() {
        let wm = sample();
        let xml = wm.to_xml().unwrap();
        assert!(xml.contains("DownloadType"));
        let restored = Watermark::from_xml(&xml).unwrap();
        assert_eq!(restored, wm);
    }

    #[test]
    fn typed_watermark_access() {
        let wm = sample();
        assert_eq!(wm.get_watermark::<u32>("retries"), Some(3));
        assert_eq!(wm.get_watermark::<u32>("bin/Lib.dll"), None);
        assert_eq!(wm.name(), Some("$/Proj/Lib"));
    }

    #[test]
    fn emptiness_ignores_tags() {
        let mut wm = Watermark::new("FileShareCopier");
        wm.tags.insert(TAG_NAME, "A");
        assert!(wm.is_empty());
        wm.add_artifact("x");
        assert!(!wm.is_empty());
    }

    #[test]
    fn outer_whitespace_survives_round_trip() {
        let mut wm = Watermark::new("FileShareCopier");
        wm.tags.insert(TAG_NAME, "PackageA");
        wm.update_watermark("notes ", "  padded value  ");
        wm.update_watermark("multi", "line one\r\nline two");
        wm.add_artifact("/out/trailing ");
        wm.add_artifact("   ");

        let xml = wm.to_xml().unwrap();
        assert!(xml.contains(ENCODED_PREFIX));
        let restored = Watermark::from_xml(&xml).unwrap();
        assert_eq!(restored, wm);
        assert_eq!(restored.watermarks.get("notes "), Some("  padded value  "));
        assert!(restored.artifacts_to_clean.contains("/out/trailing "));
    }

    #[test]
    fn plain_text_is_stored_literally() {
        let xml = sample().to_xml().unwrap();
        assert!(xml.contains("/work/Dependencies/bin/Lib.dll"));
        assert!(!xml.contains(ENCODED_PREFIX));

        // literal text that happens to carry the marker is encoded too
        let mut wm = Watermark::new("t");
        wm.update_watermark("k", "base64:not-really");
        let restored = Watermark::from_xml(&wm.to_xml().unwrap()).unwrap();
        assert_eq!(restored.watermarks.get("k"), Some("base64:not-really"));
    }

    #[test]
    fn malformed_encoded_text_is_rejected() {
        let xml = "<DownloadWatermark><DownloadType>t</DownloadType>\
            <ArtifactsToClean><Artifact>base64:***</Artifact></ArtifactsToClean>\
            </DownloadWatermark>";
        assert!(Watermark::from_xml(xml).is_err());
    }
}
