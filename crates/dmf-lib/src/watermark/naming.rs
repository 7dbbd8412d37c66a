//! Cache key policy for watermark files.
//!
//! Literal identities stay readable on disk (`PackageA@1.0.xml`); identities
//! that look like paths, or that contain the key separator, are hashed so the
//! file name is always legal and parses back into exactly two parts.

use crate::utils::hash::identity_hash;
use std::fmt;

pub const KEY_SEPARATOR: char = '@';
pub const WATERMARK_EXTENSION: &str = "xml";

/// True when the value carries a path separator of either platform
pub fn is_path_like(value: &str) -> bool {
    value.contains('/') || value.contains('\\')
}

/// True when the value would split a `<name>@<version>` file name
pub fn contains_separator(value: &str) -> bool {
    value.contains(KEY_SEPARATOR)
}

/// Whether an identity must be hashed before it can be used as a file name
pub fn requires_hashing(name: &str, version: &str) -> bool {
    [name, version]
        .iter()
        .any(|part| is_path_like(part) || contains_separator(part))
}

/// A (name, version) pair. Either a logical identity or an on-disk key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    pub name: String,
    pub version: String,
}

impl ComponentKey {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// The key under which this identity is stored on disk
    pub fn cache_key(&self) -> ComponentKey {
        if requires_hashing(&self.name, &self.version) {
            ComponentKey::new(identity_hash(&self.name), identity_hash(&self.version))
        } else {
            ComponentKey::new(self.name.trim(), self.version.trim())
        }
    }

    pub fn file_name(&self) -> String {
        let key = self.cache_key();
        format!(
            "{}{}{}.{}",
            key.name, KEY_SEPARATOR, key.version, WATERMARK_EXTENSION
        )
    }

    /// Parse `<name>@<version>.xml`. Anything else yields `None`.
    pub fn from_file_name(file_name: &str) -> Option<ComponentKey> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        if !extension.eq_ignore_ascii_case(WATERMARK_EXTENSION) {
            return None;
        }
        let parts: Vec<&str> = stem.split(KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [name, version] if !name.is_empty() && !version.is_empty() => {
                Some(ComponentKey::new(*name, *version))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_names_stay_readable() {
        let key = ComponentKey::new(" PackageA ", "1.0 ");
        assert_eq!(key.file_name(), "PackageA@1.0.xml");
    }

    #[test]
    fn path_like_names_are_hashed() {
        let key = ComponentKey::new("$/Proj/Lib", "C1234");
        let expected = format!("{}@{}.xml", identity_hash("$/Proj/Lib"), identity_hash("C1234"));
        assert_eq!(key.file_name(), expected);

        let windows = ComponentKey::new(r"\\server\share\Lib", "1.0");
        assert!(!windows.file_name().contains('\\'));
    }

    #[test]
    fn separator_in_identity_is_hashed() {
        for (name, version) in [("PackageA", "1.0@beta"), ("me@corp", "2.0")] {
            let key = ComponentKey::new(name, version);
            assert!(requires_hashing(name, version));
            let parsed = ComponentKey::from_file_name(&key.file_name()).unwrap();
            assert_eq!(parsed, key.cache_key());
            assert_eq!(parsed.version, identity_hash(version));
        }
        assert!(!requires_hashing("PackageA", "1.0"));
    }

    #[test]
    fn parses_file_names() {
        assert_eq!(
            ComponentKey::from_file_name("PackageA@1.0.xml"),
            Some(ComponentKey::new("PackageA", "1.0"))
        );
        assert_eq!(ComponentKey::from_file_name("PackageA.xml"), None);
        assert_eq!(ComponentKey::from_file_name("a@b@c.xml"), None);
        assert_eq!(ComponentKey::from_file_name("PackageA@1.0.xml.tmp"), None);
        assert_eq!(ComponentKey::from_file_name("@1.0.xml"), None);
    }
}
