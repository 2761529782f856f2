use crate::fusing::{FusingShardMerger, ShardMerger, ShardedApk, ShardedSystemSplits};
use crate::grouping::{group_splits_for_apex, group_splits_to_shards, DeviceFilter, ShardDefinition};
use crate::matcher::{DeviceMatcher, TargetingMatcher};
use crate::pipeline::generate_splits;
use crate::{check_invariant, map_scoped, ShardError};
use shardkit_model::{
    BundleMetadata, BundleModule, DeviceSpec, ModuleName, ModuleSplit, OptimizationDimension,
    ShardingOptions,
};
use std::collections::BTreeSet;
use tracing::info;

/// Generates standalone packages from bundle modules.
///
/// Each shard targets one point in the ABI x screen density configuration
/// space and is the fusion of:
///
/// - all master splits, contained unconditionally in every shard,
/// - all language splits,
/// - the ABI splits targeting that ABI,
/// - the density splits targeting that density.
pub struct BundleSharder {
    options: ShardingOptions,
    merger: Box<dyn ShardMerger>,
    matcher: Box<dyn DeviceMatcher>,
}

impl BundleSharder {
    pub fn new(options: ShardingOptions) -> Self {
        Self {
            options,
            merger: Box::new(FusingShardMerger),
            matcher: Box::new(TargetingMatcher),
        }
    }

    #[must_use]
    pub fn with_merger(mut self, merger: Box<dyn ShardMerger>) -> Self {
        self.merger = merger;
        self
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: Box<dyn DeviceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn shard_bundle(
        &self,
        modules: &[BundleModule],
        dimensions: &BTreeSet<OptimizationDimension>,
        metadata: &BundleMetadata,
    ) -> Result<Vec<ShardedApk>, ShardError> {
        let shards = self.plan_shards(modules, dimensions)?;
        let apks = self.merger.merge(&shards, metadata)?;
        info!("generated {} standalone shard(s)", apks.len());
        Ok(apks)
    }

    /// The unfused shard definitions `shard_bundle` would fuse.
    pub fn plan_shards(
        &self,
        modules: &[BundleModule],
        dimensions: &BTreeSet<OptimizationDimension>,
    ) -> Result<Vec<ShardDefinition>, ShardError> {
        self.unfused_shards(modules, dimensions, None)
    }

    /// Shard for exactly the configuration of `device`: one system package
    /// plus additional splits for content that is not fused into it.
    pub fn shard_for_system_apps(
        &self,
        modules: &[BundleModule],
        dimensions: &BTreeSet<OptimizationDimension>,
        metadata: &BundleMetadata,
        device: &DeviceSpec,
    ) -> Result<ShardedSystemSplits, ShardError> {
        let filter = DeviceFilter {
            device,
            matcher: self.matcher.as_ref(),
        };
        let shards = self.unfused_shards(modules, dimensions, Some(filter))?;
        check_invariant!(
            shards.len() == 1,
            "Expected exactly one shard for the device, got {}.",
            shards.len()
        );

        let fusing_modules: BTreeSet<ModuleName> = modules
            .iter()
            .filter(|m| m.include_in_fusing)
            .map(|m| m.name.clone())
            .collect();
        let out = self
            .merger
            .merge_system_shard(&shards[0], &fusing_modules, metadata, device)?;
        info!(
            "generated system image with {} additional split(s)",
            out.additional_splits.len()
        );
        Ok(out)
    }

    /// One package per APEX system image, each fused with the module's
    /// master split.
    pub fn shard_apex_bundle(&self, module: &BundleModule) -> Result<Vec<ShardedApk>, ShardError> {
        let splits = generate_splits(module, &BTreeSet::new(), self.options)?;
        let shards = group_splits_for_apex(&splits)?;
        let apks = self.merger.merge_apex(&shards)?;
        info!("generated {} APEX shard(s) for '{}'", apks.len(), module.name);
        Ok(apks)
    }

    fn unfused_shards(
        &self,
        modules: &[BundleModule],
        dimensions: &BTreeSet<OptimizationDimension>,
        filter: Option<DeviceFilter<'_>>,
    ) -> Result<Vec<ShardDefinition>, ShardError> {
        check_invariant!(!modules.is_empty(), "At least one module is required.");

        let per_module = map_scoped(modules, |module| {
            generate_splits(module, dimensions, self.options)
        })?;
        let splits: Vec<ModuleSplit> = per_module.into_iter().flatten().collect();
        info!(
            "generated {} split(s) from {} module(s)",
            splits.len(),
            modules.len()
        );
        group_splits_to_shards(&splits, filter)
    }
}

impl Default for BundleSharder {
    fn default() -> Self {
        Self::new(ShardingOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkit_model::{Abi, ApkTargeting, ModuleEntry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn module(name: &str, paths: &[&str]) -> BundleModule {
        BundleModule::new(
            name,
            paths
                .iter()
                .map(|p| ModuleEntry::new(*p, format!("{name}:{p}").into_bytes()))
                .collect(),
        )
    }

    fn abi_only() -> BTreeSet<OptimizationDimension> {
        BTreeSet::from([OptimizationDimension::Abi])
    }

    #[test]
    fn empty_module_list_is_an_invariant_violation() {
        let sharder = BundleSharder::default();
        let err = sharder
            .shard_bundle(&[], &abi_only(), &BundleMetadata::default())
            .unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("At least one module is required."));
    }

    #[test]
    fn shards_per_abi() {
        let modules = vec![
            module("base", &["lib/x86/a.so", "lib/arm64-v8a/a.so", "dex/classes.dex"]),
            module("feature", &["lib/x86/f.so", "lib/arm64-v8a/f.so"]),
        ];
        let apks = BundleSharder::default()
            .shard_bundle(&modules, &abi_only(), &BundleMetadata::default())
            .unwrap();
        assert_eq!(apks.len(), 2);
        for apk in &apks {
            assert_eq!(apk.entries.len(), 3);
            assert_eq!(apk.modules.len(), 2);
        }
    }

    #[test]
    fn system_mode_yields_one_image() {
        let modules = vec![module(
            "base",
            &["lib/x86/a.so", "lib/arm64-v8a/a.so", "dex/classes.dex"],
        )];
        let device = DeviceSpec {
            supported_abis: vec![Abi::Arm64V8a],
            screen_density: 420,
            supported_locales: vec!["en-US".to_owned()],
        };
        let out = BundleSharder::default()
            .shard_for_system_apps(&modules, &abi_only(), &BundleMetadata::default(), &device)
            .unwrap();
        assert_eq!(
            out.system_image.targeting,
            ApkTargeting::for_abi(Abi::Arm64V8a, [Abi::X86])
        );
        assert!(out.additional_splits.is_empty());
    }

    struct CountingMerger {
        calls: Arc<AtomicUsize>,
    }

    impl ShardMerger for CountingMerger {
        fn merge(
            &self,
            shards: &[ShardDefinition],
            metadata: &BundleMetadata,
        ) -> Result<Vec<ShardedApk>, ShardError> {
            self.calls.fetch_add(shards.len(), Ordering::SeqCst);
            FusingShardMerger.merge(shards, metadata)
        }

        fn merge_system_shard(
            &self,
            shard: &ShardDefinition,
            fusing_modules: &BTreeSet<ModuleName>,
            metadata: &BundleMetadata,
            device: &DeviceSpec,
        ) -> Result<ShardedSystemSplits, ShardError> {
            FusingShardMerger.merge_system_shard(shard, fusing_modules, metadata, device)
        }

        fn merge_apex(&self, shards: &[ShardDefinition]) -> Result<Vec<ShardedApk>, ShardError> {
            FusingShardMerger.merge_apex(shards)
        }
    }

    #[test]
    fn custom_merger_receives_every_shard() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sharder = BundleSharder::default().with_merger(Box::new(CountingMerger {
            calls: Arc::clone(&calls),
        }));
        let modules = vec![module("base", &["lib/x86/a.so", "lib/mips/a.so"])];
        sharder
            .shard_bundle(&modules, &abi_only(), &BundleMetadata::default())
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct RejectAll;

    impl DeviceMatcher for RejectAll {
        fn matches(&self, _: &ApkTargeting, _: &DeviceSpec) -> bool {
            false
        }
    }

    struct AcceptAll;

    impl DeviceMatcher for AcceptAll {
        fn matches(&self, _: &ApkTargeting, _: &DeviceSpec) -> bool {
            true
        }
    }

    #[test]
    fn system_mode_rejects_matcher_selecting_several_shards() {
        let sharder = BundleSharder::default().with_matcher(Box::new(AcceptAll));
        let modules = vec![module(
            "base",
            &["lib/x86/a.so", "lib/arm64-v8a/a.so", "dex/classes.dex"],
        )];
        let device = DeviceSpec {
            supported_abis: vec![Abi::Arm64V8a],
            screen_density: 420,
            supported_locales: vec![],
        };
        let err = sharder
            .shard_for_system_apps(&modules, &abi_only(), &BundleMetadata::default(), &device)
            .unwrap_err();
        assert!(matches!(err, ShardError::InvariantViolation(_)));
        assert!(err.is_internal());
        assert!(err
            .to_string()
            .contains("Expected exactly one shard for the device, got 2."));
    }

    #[test]
    fn custom_matcher_filters_system_shard() {
        let sharder = BundleSharder::default().with_matcher(Box::new(RejectAll));
        let modules = vec![module("base", &["lib/x86/a.so", "dex/classes.dex"])];
        let device = DeviceSpec {
            supported_abis: vec![Abi::X86],
            screen_density: 160,
            supported_locales: vec![],
        };
        let out = sharder
            .shard_for_system_apps(&modules, &abi_only(), &BundleMetadata::default(), &device)
            .unwrap();
        let paths: Vec<&str> = out
            .system_image
            .entries
            .iter()
            .map(|e| e.path.as_str())
            .collect();
        assert_eq!(paths, ["dex/classes.dex"]);
    }
}
