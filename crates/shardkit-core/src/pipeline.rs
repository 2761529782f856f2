use crate::merger::merge_same_targeting;
use crate::splitters::SplitterKind;
use crate::{check_invariant, ShardError, SplitterError};
use shardkit_model::{BundleModule, ModuleSplit, OptimizationDimension, ShardingOptions};
use std::collections::BTreeSet;
use tracing::debug;

/// An ordered chain of splitters; each stage splits every output of the
/// previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplittingPipeline {
    splitters: Vec<SplitterKind>,
}

impl SplittingPipeline {
    pub fn new(splitters: Vec<SplitterKind>) -> Self {
        Self { splitters }
    }

    pub fn splitters(&self) -> &[SplitterKind] {
        &self.splitters
    }

    pub fn split(&self, split: ModuleSplit) -> Result<Vec<ModuleSplit>, SplitterError> {
        let mut current = vec![split];
        for splitter in &self.splitters {
            let mut next = Vec::with_capacity(current.len());
            for split in &current {
                next.extend(splitter.split(split)?);
            }
            current = next;
        }
        Ok(current)
    }

    pub fn native_libraries(
        dimensions: &BTreeSet<OptimizationDimension>,
        options: ShardingOptions,
    ) -> Self {
        let mut splitters = Vec::new();
        if dimensions.contains(&OptimizationDimension::Abi) {
            splitters.push(SplitterKind::AbiNativeLibraries {
                include_64_bit: options.generate_64_bit_shard,
            });
        }
        Self::new(splitters)
    }

    pub fn resources(
        dimensions: &BTreeSet<OptimizationDimension>,
        options: ShardingOptions,
    ) -> Self {
        let mut splitters = Vec::new();
        if dimensions.contains(&OptimizationDimension::ScreenDensity) {
            splitters.push(SplitterKind::ScreenDensityResources);
        }
        if split_by_language(dimensions, options) {
            splitters.push(SplitterKind::LanguageResources);
        }
        Self::new(splitters)
    }

    pub fn assets(dimensions: &BTreeSet<OptimizationDimension>, options: ShardingOptions) -> Self {
        let mut splitters = Vec::new();
        if split_by_language(dimensions, options) {
            splitters.push(SplitterKind::LanguageAssets);
        }
        Self::new(splitters)
    }

    /// APEX images are split by multi-ABI regardless of the dimensions.
    pub fn apex_images() -> Self {
        Self::new(vec![SplitterKind::AbiApexImages])
    }
}

fn split_by_language(
    dimensions: &BTreeSet<OptimizationDimension>,
    options: ShardingOptions,
) -> bool {
    dimensions.contains(&OptimizationDimension::Language) && options.split_by_language
}

/// Split one module into its targeted splits.
///
/// Splits with identical targeting are merged and split names are dropped;
/// exactly one master split remains.
pub fn generate_splits(
    module: &BundleModule,
    dimensions: &BTreeSet<OptimizationDimension>,
    options: ShardingOptions,
) -> Result<Vec<ModuleSplit>, ShardError> {
    let mut raw = Vec::new();
    raw.extend(
        SplittingPipeline::native_libraries(dimensions, options)
            .split(ModuleSplit::for_native_libraries(module))?,
    );
    raw.extend(
        SplittingPipeline::resources(dimensions, options)
            .split(ModuleSplit::for_resources(module))?,
    );
    raw.extend(SplittingPipeline::apex_images().split(ModuleSplit::for_apex(module))?);
    raw.extend(
        SplittingPipeline::assets(dimensions, options).split(ModuleSplit::for_assets(module))?,
    );
    raw.push(ModuleSplit::for_dex(module));
    raw.push(ModuleSplit::for_root(module));

    let merged: Vec<ModuleSplit> = merge_same_targeting(raw)?
        .into_iter()
        .map(ModuleSplit::remove_split_name)
        .collect();

    let master_count = merged.iter().filter(|s| s.is_master_split()).count();
    check_invariant!(
        master_count == 1,
        "Expected one master split in module '{}', got {master_count}.",
        module.name
    );
    debug!("module '{}': {} split(s)", module.name, merged.len());
    Ok(merged)
}
