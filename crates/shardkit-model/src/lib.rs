//! Data model and bundle manifest parsing for shardkit.
//!
//! This crate defines the values the sharding core exchanges: targeting
//! descriptors (`ApkTargeting`), bundle modules and their content categories,
//! module splits, device specs and bundle metadata. It also parses the TOML
//! bundle manifest (`BundleManifestV1`), normalizes it (`NormalizedBundle`)
//! and loads module contents from disk (`load_bundle`).

pub mod bundle;
pub mod device;
pub mod dimension;
pub mod manifest;
pub mod metadata;
pub mod module;
pub mod normalize;
pub mod split;
pub mod targeting;
pub mod types;

pub use bundle::{load_bundle, read_module_dir, LoadedBundle};
pub use device::DeviceSpec;
pub use dimension::{OptimizationDimension, ShardingOptions};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, BundleManifestV1, ManifestError, ModuleSection,
    ShardingSection,
};
pub use metadata::BundleMetadata;
pub use module::{BundleModule, ContentCategory, ModuleEntry};
pub use normalize::{NormalizedBundle, NormalizedMetadataFile, NormalizedModule};
pub use split::ModuleSplit;
pub use targeting::{
    Abi, AbiSet, AbiTargeting, ApkTargeting, DensityBucket, DensityTargeting,
    DimensionTargeting, Language, LanguageTargeting, MultiAbiTargeting, TargetingError,
};
pub use types::{ModuleName, ShardId, SplitName};
