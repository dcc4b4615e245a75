// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Configuration under governance and the file paths it is deployed to.

use serde::{Deserialize, Deserializer, Serialize};

/// Read-only descriptor of the configuration being rolled out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: u64,
    pub name: String,
    /// Serialization format, also the file suffix (`toml`, `yaml`, ...)
    pub format: String,
    /// Target version every host should converge on
    pub version: String,
}

impl Configuration {
    /// File name as published under the coordination-store callback key
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.format)
    }

    /// Exact, case-sensitive match against the target version
    pub fn is_target_version(&self, reported: &str) -> bool {
        self.version == reported
    }
}

/// Ordered list of candidate paths the file may be deployed under on a host.
///
/// Deserializes from a list or from the registry's `;`-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilePathSet(Vec<String>);

impl<'de> Deserialize<'de> for FilePathSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Joined(String),
            List(Vec<String>),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Joined(joined) => Self::parse(&joined),
            Raw::List(paths) => Self::new(paths),
        })
    }
}

impl FilePathSet {
    pub fn new(paths: Vec<String>) -> Self {
        Self(paths)
    }

    /// Parse the semicolon-delimited form used by the host registry.
    /// Blank segments are dropped; declaration order is kept.
    pub fn parse(joined: &str) -> Self {
        Self(
            joined
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_order_and_drops_blanks() {
        let paths = FilePathSet::parse("/etc/app/a.toml; ;/etc/app/b.toml;");
        let collected: Vec<&str> = paths.iter().collect();
        assert_eq!(collected, vec!["/etc/app/a.toml", "/etc/app/b.toml"]);
    }

    #[test]
    fn test_deserialize_joined_or_list() {
        let joined: FilePathSet = serde_json::from_str(r#""/etc/app/a.toml;/etc/app/b.toml""#).unwrap();
        let list: FilePathSet = serde_json::from_str(r#"["/etc/app/a.toml", "/etc/app/b.toml"]"#).unwrap();
        assert_eq!(joined, list);
        assert_eq!(joined.len(), 2);
        assert_eq!(serde_json::to_string(&joined).unwrap(), r#"["/etc/app/a.toml","/etc/app/b.toml"]"#);
    }

    #[test]
    fn test_parse_empty() {
        assert!(FilePathSet::parse("").is_empty());
    }

    #[test]
    fn test_version_match_is_exact() {
        let config = Configuration {
            id: 7,
            name: "app".to_string(),
            format: "toml".to_string(),
            version: "v3".to_string(),
        };
        assert!(config.is_target_version("v3"));
        assert!(!config.is_target_version("V3"));
        assert!(!config.is_target_version("v3 "));
        assert_eq!(config.file_name(), "app.toml");
    }
}
