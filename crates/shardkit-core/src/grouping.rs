//! Grouping of module splits into shard definitions.
//!
//! The splits of all modules (`m1-master, m1-abi1, m1-abi2, m1-density1, ...,
//! m2-master, ...`) are first partitioned by targeting dimension into master,
//! ABI, density and language splits. ABI and density splits are then
//! partitioned again by their exact targeting, so that e.g. `{m1-abi1,
//! m2-abi1}` form one group. Every member of the cartesian product of ABI
//! groups and density groups, together with all master and language splits,
//! is one shard to be fused.

use crate::matcher::DeviceMatcher;
use crate::{check_invariant, ShardError};
use indexmap::IndexMap;
use shardkit_model::{ApkTargeting, DeviceSpec, ModuleSplit};
use std::collections::BTreeSet;
use std::fmt::Display;
use tracing::{debug, warn};

/// The splits to fuse into one package.
pub type ShardDefinition = Vec<ModuleSplit>;

/// Restriction of ABI and density splits to those serving one device.
#[derive(Clone, Copy)]
pub struct DeviceFilter<'a> {
    pub device: &'a DeviceSpec,
    pub matcher: &'a dyn DeviceMatcher,
}

impl DeviceFilter<'_> {
    fn accepts(&self, split: &ModuleSplit) -> bool {
        self.matcher.matches(&split.targeting, self.device)
    }
}

pub fn group_splits_to_shards(
    splits: &[ModuleSplit],
    filter: Option<DeviceFilter<'_>>,
) -> Result<Vec<ShardDefinition>, ShardError> {
    check_invariant!(
        !splits.iter().any(|s| s.targeting.has_abi_targeting()
            && s.targeting.has_screen_density_targeting()),
        "No split is expected to have both ABI and screen density targeting."
    );

    let abi_splits = subset_with_targeting(splits, ApkTargeting::has_abi_targeting, filter);
    let density_splits =
        subset_with_targeting(splits, ApkTargeting::has_screen_density_targeting, filter);
    let language_splits: Vec<&ModuleSplit> = splits
        .iter()
        .filter(|s| s.targeting.has_language_targeting())
        .collect();
    let master_splits = master_splits(splits)?;

    let unassigned = splits
        .iter()
        .filter(|s| {
            !s.master
                && !s.targeting.has_abi_targeting()
                && !s.targeting.has_screen_density_targeting()
                && !s.targeting.has_language_targeting()
        })
        .count();
    if unassigned > 0 {
        warn!("{unassigned} split(s) target no shardable dimension and are left out of the shards");
    }

    // Density splitters emit the same universe for every module.
    let density_universes = distinct_universes(&density_splits, ApkTargeting::density_universe);
    check_invariant!(
        density_universes.len() <= 1,
        "Density splits are expected to cover the same densities, got {density_universes:?}."
    );
    let abi_universes = distinct_universes(&abi_splits, ApkTargeting::abi_universe);
    if abi_universes.len() > 1 {
        return Err(ShardError::AbiUniverseMismatch {
            universes: describe_universes(&abi_universes),
        });
    }

    let abi_groups = partition_by_targeting(&abi_splits);
    let density_groups = partition_by_targeting(&density_splits);
    debug!(
        "grouping {} master, {} language, {} ABI group(s), {} density group(s)",
        master_splits.len(),
        language_splits.len(),
        abi_groups.len(),
        density_groups.len()
    );

    let mut shards = Vec::with_capacity(abi_groups.len() * density_groups.len());
    for abi_group in &abi_groups {
        for density_group in &density_groups {
            let shard: ShardDefinition = master_splits
                .iter()
                .chain(&language_splits)
                .chain(abi_group)
                .chain(density_group)
                .map(|s| (*s).clone())
                .collect();
            shards.push(shard);
        }
    }
    Ok(shards)
}

/// Pair the single master split of an APEX module with each of its
/// multi-ABI splits.
pub fn group_splits_for_apex(splits: &[ModuleSplit]) -> Result<Vec<ShardDefinition>, ShardError> {
    let (multi_abi, others): (Vec<&ModuleSplit>, Vec<&ModuleSplit>) = splits
        .iter()
        .partition(|s| s.targeting.has_multi_abi_targeting());

    check_invariant!(
        others.len() == 1,
        "Expected exactly one master split in an APEX module, got {}.",
        others.len()
    );
    let master = others[0];
    check_invariant!(
        master.targeting.is_default(),
        "Master splits are expected to have default targeting, got '{}'.",
        master.targeting
    );

    Ok(multi_abi
        .into_iter()
        .map(|split| vec![master.clone(), split.clone()])
        .collect())
}

fn subset_with_targeting<'a>(
    splits: &'a [ModuleSplit],
    predicate: impl Fn(&ApkTargeting) -> bool,
    filter: Option<DeviceFilter<'_>>,
) -> Vec<&'a ModuleSplit> {
    splits
        .iter()
        .filter(|s| predicate(&s.targeting))
        .filter(|s| filter.map_or(true, |f| f.accepts(s)))
        .collect()
}

fn master_splits(splits: &[ModuleSplit]) -> Result<Vec<&ModuleSplit>, ShardError> {
    let masters: Vec<&ModuleSplit> = splits.iter().filter(|s| s.is_master_split()).collect();
    check_invariant!(
        !masters.is_empty(),
        "Expecting at least one master split, got {}.",
        masters.len()
    );
    if let Some(bad) = masters.iter().find(|s| !s.targeting.is_default()) {
        return Err(ShardError::InvariantViolation(format!(
            "Master splits are expected to have default targeting, got '{}' in module '{}'.",
            bad.targeting, bad.module_name
        )));
    }
    Ok(masters)
}

/// Distinct non-empty universes in first-encounter order.
fn distinct_universes<T: Ord>(
    splits: &[&ModuleSplit],
    universe_of: impl Fn(&ApkTargeting) -> BTreeSet<T>,
) -> Vec<BTreeSet<T>> {
    let mut out: Vec<BTreeSet<T>> = Vec::new();
    for split in splits {
        let universe = universe_of(&split.targeting);
        if !universe.is_empty() && !out.contains(&universe) {
            out.push(universe);
        }
    }
    out
}

fn describe_universes<T: Display>(universes: &[BTreeSet<T>]) -> String {
    universes
        .iter()
        .map(|u| {
            let values: Vec<String> = u.iter().map(ToString::to_string).collect();
            format!("{{{}}}", values.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Group splits by exact targeting, keeping first-encounter order. An empty
/// input yields one empty group so the cartesian product is never empty.
fn partition_by_targeting<'a>(splits: &[&'a ModuleSplit]) -> Vec<Vec<&'a ModuleSplit>> {
    let mut groups: IndexMap<&ApkTargeting, Vec<&ModuleSplit>> = IndexMap::new();
    for &split in splits {
        groups.entry(&split.targeting).or_default().push(split);
    }
    if groups.is_empty() {
        return vec![Vec::new()];
    }
    groups.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::TargetingMatcher;
    use shardkit_model::{Abi, AbiSet, DensityBucket, Language, ModuleEntry, ModuleName};

    fn split(module: &str, targeting: ApkTargeting) -> ModuleSplit {
        let path = format!("{module}/{targeting}");
        ModuleSplit::new(
            ModuleName::new(module),
            vec![ModuleEntry::new(path.clone(), path.into_bytes())],
            targeting,
        )
    }

    fn abi(value: Abi, universe: &[Abi]) -> ApkTargeting {
        ApkTargeting::for_abi(value, universe.iter().copied().filter(|a| *a != value))
    }

    fn density(value: DensityBucket) -> ApkTargeting {
        ApkTargeting::for_density(value, DensityBucket::ALL.into_iter().filter(|b| *b != value))
    }

    fn master(module: &str) -> ModuleSplit {
        split(module, ApkTargeting::default())
    }

    #[test]
    fn masters_only_yield_single_shard() {
        let splits = vec![master("base")];
        let shards = group_splits_to_shards(&splits, None).unwrap();
        assert_eq!(shards, vec![splits]);
    }

    #[test]
    fn abi_by_density_cartesian_product_in_encounter_order() {
        let abis = [Abi::X86, Abi::Arm64V8a];
        let splits = vec![
            master("base"),
            split("base", abi(Abi::X86, &abis)),
            split("base", abi(Abi::Arm64V8a, &abis)),
            split("base", density(DensityBucket::Mdpi)),
            split("base", density(DensityBucket::Xhdpi)),
            split("base", density(DensityBucket::Xxhdpi)),
        ];
        let shards = group_splits_to_shards(&splits, None).unwrap();
        assert_eq!(shards.len(), 6);
        assert_eq!(shards[0][1].targeting, abi(Abi::X86, &abis));
        assert_eq!(shards[0][2].targeting, density(DensityBucket::Mdpi));
        assert_eq!(shards[2][2].targeting, density(DensityBucket::Xxhdpi));
        assert_eq!(shards[3][1].targeting, abi(Abi::Arm64V8a, &abis));
        assert!(shards.iter().all(|s| s.len() == 3 && s[0].is_master_split()));
    }

    #[test]
    fn language_splits_go_into_every_shard() {
        let abis = [Abi::X86, Abi::Arm64V8a];
        let fr = ApkTargeting::for_language(Language::new("fr").unwrap());
        let splits = vec![
            master("base"),
            split("base", fr.clone()),
            split("base", abi(Abi::X86, &abis)),
            split("base", abi(Abi::Arm64V8a, &abis)),
        ];
        let shards = group_splits_to_shards(&splits, None).unwrap();
        assert_eq!(shards.len(), 2);
        for shard in &shards {
            assert_eq!(shard[1].targeting, fr);
        }
    }

    #[test]
    fn abi_universe_mismatch_is_user_facing() {
        let splits = vec![
            master("base"),
            split("base", abi(Abi::Arm64V8a, &[Abi::Arm64V8a])),
            master("feature"),
            split("feature", abi(Abi::Arm64V8a, &[Abi::Arm64V8a, Abi::X86])),
            split("feature", abi(Abi::X86, &[Abi::Arm64V8a, Abi::X86])),
        ];
        let err = group_splits_to_shards(&splits, None).unwrap_err();
        assert!(matches!(err, ShardError::AbiUniverseMismatch { .. }));
        assert!(!err.is_internal());
    }

    #[test]
    fn density_universe_mismatch_is_internal() {
        let splits = vec![
            master("base"),
            split("base", ApkTargeting::for_density(DensityBucket::Mdpi, [])),
            split(
                "base",
                ApkTargeting::for_density(DensityBucket::Hdpi, [DensityBucket::Mdpi]),
            ),
        ];
        let err = group_splits_to_shards(&splits, None).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn abi_and_density_on_one_split_is_internal() {
        let mut both = abi(Abi::X86, &[Abi::X86]);
        both.screen_density = density(DensityBucket::Mdpi).screen_density;
        let splits = vec![master("base"), split("base", both)];
        let err = group_splits_to_shards(&splits, None).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn missing_master_is_internal() {
        let splits = vec![split("base", abi(Abi::X86, &[Abi::X86]))];
        assert!(group_splits_to_shards(&splits, None)
            .unwrap_err()
            .is_internal());
    }

    #[test]
    fn master_flag_with_targeting_is_internal() {
        let mut bogus = split("base", abi(Abi::X86, &[Abi::X86]));
        bogus.master = true;
        assert!(group_splits_to_shards(&[bogus], None)
            .unwrap_err()
            .is_internal());
    }

    #[test]
    fn device_filter_keeps_single_configuration() {
        let abis = [Abi::X86, Abi::Arm64V8a];
        let mut splits = vec![
            master("base"),
            split("base", abi(Abi::X86, &abis)),
            split("base", abi(Abi::Arm64V8a, &abis)),
        ];
        splits.extend(DensityBucket::ALL.map(|b| split("base", density(b))));

        let device = DeviceSpec {
            supported_abis: vec![Abi::Arm64V8a],
            screen_density: 160,
            supported_locales: vec!["en".to_owned()],
        };
        let filter = DeviceFilter {
            device: &device,
            matcher: &TargetingMatcher,
        };
        let shards = group_splits_to_shards(&splits, Some(filter)).unwrap();
        assert_eq!(shards.len(), 1);
        assert_eq!(shards[0][1].targeting, abi(Abi::Arm64V8a, &abis));
        assert_eq!(shards[0][2].targeting, density(DensityBucket::Mdpi));
    }

    #[test]
    fn apex_pairs_master_with_each_image() {
        let images: Vec<AbiSet> = vec![
            AbiSet::from([Abi::X86]),
            AbiSet::from([Abi::X86_64, Abi::X86]),
            AbiSet::from([Abi::Arm64V8a]),
        ];
        let mut splits = vec![master("apex")];
        for set in &images {
            let alternatives = images.iter().filter(|s| *s != set).cloned();
            splits.push(split(
                "apex",
                ApkTargeting::for_multi_abi(set.clone(), alternatives),
            ));
        }
        let shards = group_splits_for_apex(&splits).unwrap();
        assert_eq!(shards.len(), 3);
        for (shard, set) in shards.iter().zip(&images) {
            assert_eq!(shard.len(), 2);
            assert!(shard[0].is_master_split());
            assert!(shard[1].targeting.multi_abi.value.contains(set));
        }
    }

    #[test]
    fn apex_requires_single_default_master() {
        let two_masters = vec![master("apex"), master("apex")];
        assert!(group_splits_for_apex(&two_masters).unwrap_err().is_internal());

        let targeted = vec![split("apex", abi(Abi::X86, &[Abi::X86]))];
        assert!(group_splits_for_apex(&targeted).unwrap_err().is_internal());
    }
}
