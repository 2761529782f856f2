use crate::device::DeviceSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("unsupported manifest_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("manifest declares no modules")]
    NoModules,
    #[error("module name must not be empty")]
    EmptyModuleName,
    #[error("duplicate module name: '{0}'")]
    DuplicateModule(String),
    #[error("{0}")]
    UnknownDimension(String),
    #[error("invalid device spec: {0}")]
    InvalidDevice(String),
    #[error("module directory not found: {}", .0.display())]
    ModuleDirMissing(PathBuf),
    #[error("metadata path must not be empty")]
    EmptyMetadataPath,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BundleManifestV1 {
    pub manifest_version: u32,
    #[serde(default)]
    pub sharding: ShardingSection,
    #[serde(default)]
    pub device: Option<DeviceSpec>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub modules: Vec<ModuleSection>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ShardingSection {
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default = "default_true")]
    pub split_by_language: bool,
    #[serde(default = "default_true")]
    pub generate_64_bit_shard: bool,
}

impl Default for ShardingSection {
    fn default() -> Self {
        Self {
            dimensions: Vec::new(),
            split_by_language: true,
            generate_64_bit_shard: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ModuleSection {
    pub name: String,
    /// Directory holding the module files, relative to the manifest.
    pub path: String,
    #[serde(default = "default_true")]
    pub include_in_fusing: bool,
}

fn default_true() -> bool {
    true
}

pub fn parse_manifest_str(input: &str) -> Result<BundleManifestV1, ManifestError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<BundleManifestV1, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_manifest() {
        let input = r#"
manifest_version = 1

[sharding]
dimensions = ["abi", "screen_density", "language"]
split_by_language = false
generate_64_bit_shard = false

[device]
supported_abis = ["arm64-v8a"]
screen_density = 480
supported_locales = ["en-US"]

[metadata]
"com.example/mapping.txt" = "build/mapping.txt"

[[modules]]
name = "base"
path = "modules/base"

[[modules]]
name = "camera"
path = "modules/camera"
include_in_fusing = false
"#;
        let manifest = parse_manifest_str(input).expect("should parse");
        assert_eq!(manifest.manifest_version, 1);
        assert_eq!(manifest.sharding.dimensions.len(), 3);
        assert!(!manifest.sharding.split_by_language);
        assert!(!manifest.sharding.generate_64_bit_shard);
        assert_eq!(manifest.device.as_ref().unwrap().screen_density, 480);
        assert_eq!(manifest.metadata.len(), 1);
        assert_eq!(manifest.modules.len(), 2);
        assert!(manifest.modules[0].include_in_fusing);
        assert!(!manifest.modules[1].include_in_fusing);
    }

    #[test]
    fn parses_minimal_manifest() {
        let input = r#"
manifest_version = 1

[[modules]]
name = "base"
path = "base"
"#;
        let manifest = parse_manifest_str(input).expect("should parse");
        assert!(manifest.sharding.dimensions.is_empty());
        assert!(manifest.sharding.split_by_language);
        assert!(manifest.sharding.generate_64_bit_shard);
        assert!(manifest.device.is_none());
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
manifest_version = 1

[sharding]
compression = "max"
"#;
        assert!(parse_manifest_str(input).is_err());
    }

    #[test]
    fn rejects_module_without_path() {
        let input = r#"
manifest_version = 1

[[modules]]
name = "base"
"#;
        assert!(parse_manifest_str(input).is_err());
    }
}
