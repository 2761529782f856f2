//! Dimension splitters.
//!
//! Every splitter divides one content category along exactly one dimension
//! and never tags a split with anything outside that dimension. Splitters only
//! divide untargeted splits; a split that already carries targeting passes
//! through unchanged, so chaining splitters never produces multi-dimension
//! targeting.

use crate::SplitterError;
use shardkit_model::{
    Abi, AbiSet, ApkTargeting, DensityBucket, Language, ModuleEntry, ModuleSplit,
};
use std::collections::{BTreeMap, BTreeSet};

/// The closed set of splitters a pipeline stage can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterKind {
    /// `lib/<abi>/...` into one split per ABI.
    AbiNativeLibraries { include_64_bit: bool },
    /// Density-qualified resources into one split per density bucket.
    ScreenDensityResources,
    /// Language-qualified resources into one split per language.
    LanguageResources,
    /// `assets/...#lang_<lang>/...` into one split per language.
    LanguageAssets,
    /// `apex/<abi>[.<abi>...].img` into one multi-ABI split per image.
    AbiApexImages,
}

impl SplitterKind {
    pub fn split(self, split: &ModuleSplit) -> Result<Vec<ModuleSplit>, SplitterError> {
        if !split.targeting.is_default() {
            return Ok(vec![split.clone()]);
        }
        match self {
            SplitterKind::AbiNativeLibraries { include_64_bit } => {
                split_native_libraries(split, include_64_bit)
            }
            SplitterKind::ScreenDensityResources => Ok(split_density_resources(split)),
            SplitterKind::LanguageResources => Ok(split_language_resources(split)),
            SplitterKind::LanguageAssets => Ok(split_language_assets(split)),
            SplitterKind::AbiApexImages => split_apex_images(split),
        }
    }
}

fn split_native_libraries(
    split: &ModuleSplit,
    include_64_bit: bool,
) -> Result<Vec<ModuleSplit>, SplitterError> {
    let mut by_abi: BTreeMap<Abi, Vec<ModuleEntry>> = BTreeMap::new();
    let mut rest = Vec::new();
    for entry in &split.entries {
        match native_library_abi(&entry.path)? {
            Some(abi) if abi.is_64_bit() && !include_64_bit => {}
            Some(abi) => by_abi.entry(abi).or_default().push(entry.clone()),
            None => rest.push(entry.clone()),
        }
    }

    let abis: BTreeSet<Abi> = by_abi.keys().copied().collect();
    let mut out = vec![split.derive(rest, ApkTargeting::default())];
    for (abi, entries) in by_abi {
        let alternatives = abis.iter().copied().filter(|a| *a != abi);
        out.push(split.derive(entries, ApkTargeting::for_abi(abi, alternatives)));
    }
    Ok(out)
}

/// ABI of a `lib/<abi>/<file>` path; `None` for files directly under `lib/`.
fn native_library_abi(path: &str) -> Result<Option<Abi>, SplitterError> {
    let Some(rest) = path.strip_prefix("lib/") else {
        return Ok(None);
    };
    let Some((dir, _)) = rest.split_once('/') else {
        return Ok(None);
    };
    dir.parse::<Abi>()
        .map(Some)
        .map_err(|_| SplitterError::UnknownAbiDirectory(path.to_owned()))
}

/// A resource path `res/<type>[-<qualifier>...]/<file>` broken into parts.
struct ResourcePath<'a> {
    kind: &'a str,
    qualifiers: Vec<&'a str>,
    file: &'a str,
}

impl<'a> ResourcePath<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let rest = path.strip_prefix("res/")?;
        let (dir, file) = rest.split_once('/')?;
        let mut parts = dir.split('-');
        let kind = parts.next()?;
        Some(Self {
            kind,
            qualifiers: parts.collect(),
            file,
        })
    }

    fn density(&self) -> Option<DensityBucket> {
        self.qualifiers.iter().find_map(|q| q.parse().ok())
    }

    /// Resource identity with the density qualifier removed.
    fn density_agnostic_key(&self) -> String {
        let others: Vec<&str> = self
            .qualifiers
            .iter()
            .copied()
            .filter(|q| q.parse::<DensityBucket>().is_err())
            .collect();
        format!("{}[{}]/{}", self.kind, others.join("-"), self.file)
    }

    /// Language qualifier: the first qualifier after any mcc/mnc qualifiers,
    /// either a plain ISO code or a `b+<lang>+...` BCP-47 tag.
    fn language(&self) -> Option<Language> {
        let q = self
            .qualifiers
            .iter()
            .find(|q| !(q.starts_with("mcc") || q.starts_with("mnc")))?;
        if let Some(tag) = q.strip_prefix("b+") {
            return Language::new(tag.split('+').next()?).ok();
        }
        if NON_LANGUAGE_QUALIFIERS.contains(q) {
            return None;
        }
        Language::new(q).ok().filter(|l| l.as_str() == *q)
    }
}

/// Qualifiers shaped like a language code that are not one.
const NON_LANGUAGE_QUALIFIERS: &[&str] = &["car", "hdr", "ldltr", "ldrtl"];

fn split_density_resources(split: &ModuleSplit) -> Vec<ModuleSplit> {
    // density-agnostic key -> variants available per bucket
    let mut variants: BTreeMap<String, BTreeMap<DensityBucket, ModuleEntry>> = BTreeMap::new();
    let mut rest = Vec::new();
    for entry in &split.entries {
        let parsed = ResourcePath::parse(&entry.path);
        match parsed.as_ref().and_then(|p| p.density().map(|d| (p, d))) {
            Some((path, density)) => {
                variants
                    .entry(path.density_agnostic_key())
                    .or_default()
                    .insert(density, entry.clone());
            }
            None => rest.push(entry.clone()),
        }
    }

    let mut out = vec![split.derive(rest, ApkTargeting::default())];
    if variants.is_empty() {
        return out;
    }
    for bucket in DensityBucket::ALL {
        let entries: Vec<ModuleEntry> = variants
            .values()
            .filter_map(|by_density| {
                DensityBucket::best_match(bucket.dpi(), by_density.keys().copied())
                    .and_then(|best| by_density.get(&best).cloned())
            })
            .collect();
        let alternatives = DensityBucket::ALL.into_iter().filter(|b| *b != bucket);
        out.push(split.derive(entries, ApkTargeting::for_density(bucket, alternatives)));
    }
    out
}

fn split_language_resources(split: &ModuleSplit) -> Vec<ModuleSplit> {
    split_by_language(split, |path| {
        let parsed = ResourcePath::parse(path)?;
        if parsed.density().is_some() {
            return None;
        }
        parsed.language()
    })
}

fn split_language_assets(split: &ModuleSplit) -> Vec<ModuleSplit> {
    split_by_language(split, asset_language)
}

/// Language of an `assets/.../<dir>#lang_<lang>/...` path.
fn asset_language(path: &str) -> Option<Language> {
    let rest = path.strip_prefix("assets/")?;
    let mut dirs: Vec<&str> = rest.split('/').collect();
    dirs.pop();
    dirs.into_iter()
        .rev()
        .find_map(|dir| dir.split_once("#lang_").map(|(_, lang)| lang))
        .and_then(|lang| Language::new(lang).ok())
}

fn split_by_language(
    split: &ModuleSplit,
    language_of: impl Fn(&str) -> Option<Language>,
) -> Vec<ModuleSplit> {
    let mut by_language: BTreeMap<Language, Vec<ModuleEntry>> = BTreeMap::new();
    let mut rest = Vec::new();
    for entry in &split.entries {
        match language_of(&entry.path) {
            Some(lang) => by_language.entry(lang).or_default().push(entry.clone()),
            None => rest.push(entry.clone()),
        }
    }

    let mut out = vec![split.derive(rest, ApkTargeting::default())];
    for (lang, entries) in by_language {
        out.push(split.derive(entries, ApkTargeting::for_language(lang)));
    }
    out
}

const APEX_IMAGE_SUFFIX: &str = ".img";
const APEX_BUILD_INFO_SUFFIX: &str = ".build_info.pb";

fn split_apex_images(split: &ModuleSplit) -> Result<Vec<ModuleSplit>, SplitterError> {
    let mut images: BTreeMap<AbiSet, Vec<ModuleEntry>> = BTreeMap::new();
    let mut build_info: BTreeMap<String, ModuleEntry> = BTreeMap::new();
    let mut rest = Vec::new();
    for entry in &split.entries {
        let Some(name) = entry.path.strip_prefix("apex/") else {
            rest.push(entry.clone());
            continue;
        };
        if let Some(stem) = name.strip_suffix(APEX_BUILD_INFO_SUFFIX) {
            build_info.insert(stem.to_owned(), entry.clone());
        } else if let Some(stem) = name.strip_suffix(APEX_IMAGE_SUFFIX) {
            let abis = parse_apex_abis(stem)
                .ok_or_else(|| SplitterError::MalformedApexImage(entry.path.clone()))?;
            images.entry(abis).or_default().push(entry.clone());
        } else {
            rest.push(entry.clone());
        }
    }

    for (stem, entry) in build_info {
        match parse_apex_abis(&stem).filter(|abis| images.contains_key(abis)) {
            Some(abis) => images.entry(abis).or_default().push(entry),
            None => rest.push(entry),
        }
    }

    let all_sets: Vec<AbiSet> = images.keys().cloned().collect();
    let mut out = vec![split.derive(rest, ApkTargeting::default())];
    for (abis, entries) in images {
        let alternatives: Vec<AbiSet> =
            all_sets.iter().filter(|s| **s != abis).cloned().collect();
        out.push(split.derive(entries, ApkTargeting::for_multi_abi(abis, alternatives)));
    }
    Ok(out)
}

fn parse_apex_abis(stem: &str) -> Option<AbiSet> {
    if stem.is_empty() {
        return None;
    }
    stem.split('.').map(|abi| abi.parse::<Abi>().ok()).collect()
}
