use crate::device::DeviceSpec;
use crate::dimension::{OptimizationDimension, ShardingOptions};
use crate::manifest::{BundleManifestV1, ManifestError};
use crate::types::ModuleName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Validated form of a bundle manifest.
///
/// Module order is preserved as declared: it drives the order in which
/// splits are flattened and therefore the order of the produced shards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedBundle {
    pub manifest_version: u32,
    pub dimensions: BTreeSet<OptimizationDimension>,
    pub options: ShardingOptions,
    pub device: Option<DeviceSpec>,
    pub metadata: Vec<NormalizedMetadataFile>,
    pub modules: Vec<NormalizedModule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedModule {
    pub name: ModuleName,
    pub path: String,
    pub include_in_fusing: bool,
}

/// Metadata file: path inside the package and source file on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedMetadataFile {
    pub path: String,
    pub source: String,
}

impl BundleManifestV1 {
    pub fn normalize(&self) -> Result<NormalizedBundle, ManifestError> {
        if self.manifest_version != 1 {
            return Err(ManifestError::UnsupportedVersion(self.manifest_version));
        }
        if self.modules.is_empty() {
            return Err(ManifestError::NoModules);
        }

        let dimensions = self
            .sharding
            .dimensions
            .iter()
            .map(|d| d.parse::<OptimizationDimension>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(ManifestError::UnknownDimension)?;

        let mut seen = HashSet::new();
        let mut modules = Vec::with_capacity(self.modules.len());
        for section in &self.modules {
            let name = section.name.trim().to_owned();
            if name.is_empty() {
                return Err(ManifestError::EmptyModuleName);
            }
            if !seen.insert(name.clone()) {
                return Err(ManifestError::DuplicateModule(name));
            }
            modules.push(NormalizedModule {
                name: ModuleName::new(name),
                path: section.path.trim().to_owned(),
                include_in_fusing: section.include_in_fusing,
            });
        }

        if let Some(device) = &self.device {
            if device.screen_density == 0 {
                return Err(ManifestError::InvalidDevice(
                    "screen_density must be positive".to_owned(),
                ));
            }
            if device.supported_abis.is_empty() {
                return Err(ManifestError::InvalidDevice(
                    "supported_abis must not be empty".to_owned(),
                ));
            }
        }

        let mut metadata = Vec::with_capacity(self.metadata.len());
        for (path, source) in &self.metadata {
            let path = path.trim().trim_start_matches('/').to_owned();
            if path.is_empty() {
                return Err(ManifestError::EmptyMetadataPath);
            }
            metadata.push(NormalizedMetadataFile {
                path,
                source: source.trim().to_owned(),
            });
        }

        Ok(NormalizedBundle {
            manifest_version: self.manifest_version,
            dimensions,
            options: ShardingOptions {
                split_by_language: self.sharding.split_by_language,
                generate_64_bit_shard: self.sharding.generate_64_bit_shard,
            },
            device: self.device.clone(),
            metadata,
            modules,
        })
    }
}
