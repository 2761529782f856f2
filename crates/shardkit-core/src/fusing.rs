//! Fusing of shard definitions into packages.
//!
//! A `ShardMerger` turns the split lists produced by grouping into
//! `ShardedApk`s. The default `FusingShardMerger` unions the entries of all
//! splits of a shard, combines their targeting and attaches the bundle
//! metadata under `BUNDLE-METADATA/`. When several modules ship dex files
//! they are renumbered into one `classesN.dex` sequence, and only one
//! module's `AndroidManifest.xml` is kept, the base module's when present.

use crate::grouping::ShardDefinition;
use crate::{map_scoped, ShardError};
use indexmap::IndexMap;
use serde::Serialize;
use shardkit_model::{
    ApkTargeting, BundleMetadata, ContentCategory, DeviceSpec, DimensionTargeting, ModuleEntry,
    ModuleName, ModuleSplit, ShardId,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Directory prefix of bundle metadata files inside a fused package.
pub const METADATA_DIR: &str = "BUNDLE-METADATA";

const ANDROID_MANIFEST: &str = "manifest/AndroidManifest.xml";

/// A fused package: the union of the entries of one shard definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardedApk {
    pub id: ShardId,
    pub targeting: ApkTargeting,
    pub modules: Vec<ModuleName>,
    /// Sorted by path.
    pub entries: Vec<ModuleEntry>,
}

impl ShardedApk {
    pub fn short_id(&self) -> &str {
        let id = self.id.as_str();
        &id[..12.min(id.len())]
    }

    pub fn total_size(&self) -> usize {
        self.entries.iter().map(|e| e.content.len()).sum()
    }

    pub fn summary(&self) -> ShardSummary {
        ShardSummary {
            id: self.id.to_string(),
            targeting: self.targeting.to_string(),
            modules: self.modules.iter().map(ToString::to_string).collect(),
            entries: self.entries.iter().map(|e| e.path.clone()).collect(),
            size: self.total_size(),
        }
    }
}

/// Serializable overview of a package, without entry contents.
#[derive(Debug, Clone, Serialize)]
pub struct ShardSummary {
    pub id: String,
    pub targeting: String,
    pub modules: Vec<String>,
    pub entries: Vec<String>,
    pub size: usize,
}

/// Output of system-image sharding: the fused system package plus one
/// package per split that was kept out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardedSystemSplits {
    pub system_image: ShardedApk,
    pub additional_splits: Vec<ShardedApk>,
}

/// Fuses shard definitions into packages.
pub trait ShardMerger: Send + Sync {
    fn merge(
        &self,
        shards: &[ShardDefinition],
        metadata: &BundleMetadata,
    ) -> Result<Vec<ShardedApk>, ShardError>;

    fn merge_system_shard(
        &self,
        shard: &ShardDefinition,
        fusing_modules: &BTreeSet<ModuleName>,
        metadata: &BundleMetadata,
        device: &DeviceSpec,
    ) -> Result<ShardedSystemSplits, ShardError>;

    fn merge_apex(&self, shards: &[ShardDefinition]) -> Result<Vec<ShardedApk>, ShardError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FusingShardMerger;

impl ShardMerger for FusingShardMerger {
    fn merge(
        &self,
        shards: &[ShardDefinition],
        metadata: &BundleMetadata,
    ) -> Result<Vec<ShardedApk>, ShardError> {
        let apks = map_scoped(shards, |shard| fuse(shard, metadata))?;
        debug!("fused {} shard(s)", apks.len());
        Ok(apks)
    }

    fn merge_system_shard(
        &self,
        shard: &ShardDefinition,
        fusing_modules: &BTreeSet<ModuleName>,
        metadata: &BundleMetadata,
        device: &DeviceSpec,
    ) -> Result<ShardedSystemSplits, ShardError> {
        let languages = device.languages();
        let (fused, rest): (Vec<&ModuleSplit>, Vec<&ModuleSplit>) =
            shard.iter().partition(|split| {
                fusing_modules.contains(&split.module_name)
                    && (!split.targeting.has_language_targeting()
                        || languages
                            .iter()
                            .any(|l| split.targeting.language.value.contains(l)))
            });

        let mut additional: IndexMap<(ModuleName, ApkTargeting), Vec<ModuleSplit>> =
            IndexMap::new();
        for split in rest {
            additional
                .entry((split.module_name.clone(), split.targeting.clone()))
                .or_default()
                .push(split.clone());
        }
        let additional: Vec<Vec<ModuleSplit>> = additional.into_values().collect();

        let system_image = fuse_refs(&fused, metadata)?;
        let additional_splits = map_scoped(&additional, |splits| {
            fuse(splits, &BundleMetadata::default())
        })?;
        debug!(
            "system image with {} entries, {} additional split(s)",
            system_image.entries.len(),
            additional_splits.len()
        );
        Ok(ShardedSystemSplits {
            system_image,
            additional_splits,
        })
    }

    fn merge_apex(&self, shards: &[ShardDefinition]) -> Result<Vec<ShardedApk>, ShardError> {
        map_scoped(shards, |shard| fuse(shard, &BundleMetadata::default()))
    }
}

fn fuse(shard: &[ModuleSplit], metadata: &BundleMetadata) -> Result<ShardedApk, ShardError> {
    let refs: Vec<&ModuleSplit> = shard.iter().collect();
    fuse_refs(&refs, metadata)
}

fn fuse_refs(shard: &[&ModuleSplit], metadata: &BundleMetadata) -> Result<ShardedApk, ShardError> {
    let targeting = combine_targeting(shard.iter().map(|s| &s.targeting));

    let mut modules: Vec<ModuleName> = Vec::new();
    for split in shard {
        if !modules.contains(&split.module_name) {
            modules.push(split.module_name.clone());
        }
    }

    let metadata_entries = metadata
        .files()
        .map(|(path, content)| ModuleEntry::new(format!("{METADATA_DIR}/{path}"), content));
    let mut entries: BTreeMap<String, ModuleEntry> = BTreeMap::new();
    for entry in package_entries(shard, &modules)
        .into_iter()
        .chain(metadata_entries)
    {
        match entries.get(&entry.path) {
            Some(present) if present.content != entry.content => {
                return Err(ShardError::ConflictingEntry {
                    path: entry.path,
                    shard: targeting.to_string(),
                });
            }
            Some(_) => {}
            None => {
                entries.insert(entry.path.clone(), entry);
            }
        }
    }
    let entries: Vec<ModuleEntry> = entries.into_values().collect();

    Ok(ShardedApk {
        id: shard_id(&targeting, &entries),
        targeting,
        modules,
        entries,
    })
}

/// Entries of the shard's splits with per-module dex files renumbered and
/// foreign manifests dropped.
fn package_entries(shard: &[&ModuleSplit], modules: &[ModuleName]) -> Vec<ModuleEntry> {
    let mut order: Vec<&ModuleName> = modules.iter().collect();
    order.sort_by_key(|m| **m != *"base");
    let manifest_owner = order.iter().copied().find(|m| {
        shard
            .iter()
            .any(|s| s.module_name == **m && s.entries.iter().any(|e| e.path == ANDROID_MANIFEST))
    });

    let mut dex: IndexMap<&ModuleName, Vec<&ModuleEntry>> =
        order.iter().map(|m| (*m, Vec::new())).collect();
    let mut out = Vec::new();
    for split in shard.iter().copied() {
        for entry in &split.entries {
            if entry.path == ANDROID_MANIFEST && manifest_owner != Some(&split.module_name) {
                continue;
            }
            if entry.category() == ContentCategory::Dex {
                dex.entry(&split.module_name).or_default().push(entry);
            } else {
                out.push(entry.clone());
            }
        }
    }

    dex.retain(|_, files| !files.is_empty());
    if dex.len() <= 1 {
        out.extend(dex.into_values().flatten().cloned());
        return out;
    }
    let mut index = 0;
    for mut files in dex.into_values() {
        files.sort_by(|a, b| {
            dex_index(&a.path)
                .cmp(&dex_index(&b.path))
                .then_with(|| a.path.cmp(&b.path))
        });
        for file in files {
            index += 1;
            out.push(ModuleEntry::new(dex_path(index), file.content.clone()));
        }
    }
    out
}

/// Position of a dex file in its module: `classes.dex` is 1, `classesN.dex`
/// is N, anything else sorts last.
fn dex_index(path: &str) -> u32 {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name
        .strip_prefix("classes")
        .and_then(|n| n.strip_suffix(".dex"))
    {
        Some("") => 1,
        Some(n) => n.parse().unwrap_or(u32::MAX),
        None => u32::MAX,
    }
}

fn dex_path(index: u32) -> String {
    if index == 1 {
        "dex/classes.dex".to_owned()
    } else {
        format!("dex/classes{index}.dex")
    }
}

/// Union of the targeted values per dimension; alternatives are whatever of
/// the combined universe is not targeted.
fn combine_targeting<'a>(targetings: impl Iterator<Item = &'a ApkTargeting>) -> ApkTargeting {
    let mut out = ApkTargeting::default();
    for t in targetings {
        absorb(&mut out.abi, &t.abi);
        absorb(&mut out.screen_density, &t.screen_density);
        absorb(&mut out.language, &t.language);
        absorb(&mut out.multi_abi, &t.multi_abi);
    }
    out
}

fn absorb<T: Ord + Clone>(into: &mut DimensionTargeting<T>, from: &DimensionTargeting<T>) {
    let DimensionTargeting {
        value,
        alternatives,
    } = into;
    value.extend(from.value.iter().cloned());
    alternatives.extend(from.alternatives.iter().cloned());
    alternatives.retain(|v| !value.contains(v));
}

/// Blake3 over the targeting and every `path digest` line, in path order.
fn shard_id(targeting: &ApkTargeting, entries: &[ModuleEntry]) -> ShardId {
    let mut hasher = blake3::Hasher::new();
    hasher.update(targeting.to_string().as_bytes());
    hasher.update(b"\n");
    for entry in entries {
        hasher.update(entry.path.as_bytes());
        hasher.update(b" ");
        hasher.update(entry.digest().as_bytes());
        hasher.update(b"\n");
    }
    ShardId::new(hasher.finalize().to_hex().to_string())
}
