//! Targeting descriptors attached to module splits.
//!
//! An [`ApkTargeting`] has one independent field per dimension (ABI, screen
//! density, language, multi-ABI). Each dimension carries the targeted `value`
//! and the `alternatives` that sibling splits target; together they form the
//! dimension's universe. The default descriptor targets nothing and marks a
//! master split.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetingError {
    #[error("unknown ABI: '{0}'")]
    UnknownAbi(String),
    #[error("unknown screen density bucket: '{0}'")]
    UnknownDensity(String),
    #[error("invalid language code: '{0}'")]
    InvalidLanguage(String),
}

/// Processor architecture, named after its native library directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Abi {
    #[serde(rename = "armeabi")]
    Armeabi,
    #[serde(rename = "armeabi-v7a")]
    ArmeabiV7a,
    #[serde(rename = "arm64-v8a")]
    Arm64V8a,
    #[serde(rename = "x86")]
    X86,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "mips")]
    Mips,
    #[serde(rename = "mips64")]
    Mips64,
    #[serde(rename = "riscv64")]
    Riscv64,
}

impl Abi {
    pub const ALL: [Abi; 8] = [
        Abi::Armeabi,
        Abi::ArmeabiV7a,
        Abi::Arm64V8a,
        Abi::X86,
        Abi::X86_64,
        Abi::Mips,
        Abi::Mips64,
        Abi::Riscv64,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Abi::Armeabi => "armeabi",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::Arm64V8a => "arm64-v8a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
            Abi::Mips => "mips",
            Abi::Mips64 => "mips64",
            Abi::Riscv64 => "riscv64",
        }
    }

    pub fn is_64_bit(self) -> bool {
        matches!(
            self,
            Abi::Arm64V8a | Abi::X86_64 | Abi::Mips64 | Abi::Riscv64
        )
    }
}

impl fmt::Display for Abi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Abi {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Abi::ALL
            .into_iter()
            .find(|abi| abi.as_str() == s)
            .ok_or_else(|| TargetingError::UnknownAbi(s.to_owned()))
    }
}

/// Screen density bucket, ordered from lowest to highest dpi.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DensityBucket {
    Ldpi,
    Mdpi,
    Tvdpi,
    Hdpi,
    Xhdpi,
    Xxhdpi,
    Xxxhdpi,
}

impl DensityBucket {
    pub const ALL: [DensityBucket; 7] = [
        DensityBucket::Ldpi,
        DensityBucket::Mdpi,
        DensityBucket::Tvdpi,
        DensityBucket::Hdpi,
        DensityBucket::Xhdpi,
        DensityBucket::Xxhdpi,
        DensityBucket::Xxxhdpi,
    ];

    pub fn dpi(self) -> u32 {
        match self {
            DensityBucket::Ldpi => 120,
            DensityBucket::Mdpi => 160,
            DensityBucket::Tvdpi => 213,
            DensityBucket::Hdpi => 240,
            DensityBucket::Xhdpi => 320,
            DensityBucket::Xxhdpi => 480,
            DensityBucket::Xxxhdpi => 640,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DensityBucket::Ldpi => "ldpi",
            DensityBucket::Mdpi => "mdpi",
            DensityBucket::Tvdpi => "tvdpi",
            DensityBucket::Hdpi => "hdpi",
            DensityBucket::Xhdpi => "xhdpi",
            DensityBucket::Xxhdpi => "xxhdpi",
            DensityBucket::Xxxhdpi => "xxxhdpi",
        }
    }

    /// Pick the bucket serving `dpi` best among `candidates`: the smallest
    /// bucket at or above `dpi`, falling back to the largest one below it.
    pub fn best_match(dpi: u32, candidates: impl IntoIterator<Item = DensityBucket>) -> Option<Self> {
        let mut above: Option<DensityBucket> = None;
        let mut below: Option<DensityBucket> = None;
        for bucket in candidates {
            if bucket.dpi() >= dpi {
                if above.map_or(true, |b| bucket.dpi() < b.dpi()) {
                    above = Some(bucket);
                }
            } else if below.map_or(true, |b| bucket.dpi() > b.dpi()) {
                below = Some(bucket);
            }
        }
        above.or(below)
    }
}

impl fmt::Display for DensityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DensityBucket {
    type Err = TargetingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DensityBucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| TargetingError::UnknownDensity(s.to_owned()))
    }
}

/// Lowercase two- or three-letter language code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn new(code: &str) -> Result<Self, TargetingError> {
        let code = code.trim().to_ascii_lowercase();
        if !(2..=3).contains(&code.len()) || !code.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(TargetingError::InvalidLanguage(code));
        }
        Ok(Self(code))
    }

    /// Language part of a locale such as `en-US` or `pt_BR`.
    pub fn from_locale(locale: &str) -> Result<Self, TargetingError> {
        let lang = locale.split(['-', '_']).next().unwrap_or_default();
        Self::new(lang)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Set of ABIs a multi-ABI artifact (an APEX system image) is built for.
pub type AbiSet = BTreeSet<Abi>;

/// Targeting along one dimension: the targeted values plus the values of
/// sibling splits in the same dimension.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Ord + Deserialize<'de>"))]
pub struct DimensionTargeting<T: Ord> {
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub value: BTreeSet<T>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub alternatives: BTreeSet<T>,
}

impl<T: Ord> Default for DimensionTargeting<T> {
    fn default() -> Self {
        Self {
            value: BTreeSet::new(),
            alternatives: BTreeSet::new(),
        }
    }
}

impl<T: Ord + Clone> DimensionTargeting<T> {
    pub fn new(
        value: impl IntoIterator<Item = T>,
        alternatives: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            value: value.into_iter().collect(),
            alternatives: alternatives.into_iter().collect(),
        }
    }

    /// No targeting in this dimension.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.alternatives.is_empty()
    }

    pub fn universe(&self) -> BTreeSet<T> {
        self.value.union(&self.alternatives).cloned().collect()
    }
}

pub type AbiTargeting = DimensionTargeting<Abi>;
pub type DensityTargeting = DimensionTargeting<DensityBucket>;
pub type LanguageTargeting = DimensionTargeting<Language>;
pub type MultiAbiTargeting = DimensionTargeting<AbiSet>;

/// Multi-dimensional targeting descriptor of a split.
///
/// Two descriptors are equal iff every dimension matches. The derived `Ord`
/// and `Hash` make it usable as a canonical partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApkTargeting {
    #[serde(default, skip_serializing_if = "DimensionTargeting::is_empty")]
    pub abi: AbiTargeting,
    #[serde(default, skip_serializing_if = "DimensionTargeting::is_empty")]
    pub screen_density: DensityTargeting,
    #[serde(default, skip_serializing_if = "DimensionTargeting::is_empty")]
    pub language: LanguageTargeting,
    #[serde(default, skip_serializing_if = "DimensionTargeting::is_empty")]
    pub multi_abi: MultiAbiTargeting,
}

impl ApkTargeting {
    pub fn for_abi(value: Abi, alternatives: impl IntoIterator<Item = Abi>) -> Self {
        Self {
            abi: AbiTargeting::new([value], alternatives),
            ..Self::default()
        }
    }

    pub fn for_density(
        value: DensityBucket,
        alternatives: impl IntoIterator<Item = DensityBucket>,
    ) -> Self {
        Self {
            screen_density: DensityTargeting::new([value], alternatives),
            ..Self::default()
        }
    }

    pub fn for_language(value: Language) -> Self {
        Self {
            language: LanguageTargeting::new([value], []),
            ..Self::default()
        }
    }

    pub fn for_multi_abi(value: AbiSet, alternatives: impl IntoIterator<Item = AbiSet>) -> Self {
        Self {
            multi_abi: MultiAbiTargeting::new([value], alternatives),
            ..Self::default()
        }
    }

    pub fn has_abi_targeting(&self) -> bool {
        !self.abi.is_empty()
    }

    pub fn has_screen_density_targeting(&self) -> bool {
        !self.screen_density.is_empty()
    }

    pub fn has_language_targeting(&self) -> bool {
        !self.language.is_empty()
    }

    pub fn has_multi_abi_targeting(&self) -> bool {
        !self.multi_abi.is_empty()
    }

    /// The untargeted descriptor of a master split.
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn abi_universe(&self) -> BTreeSet<Abi> {
        self.abi.universe()
    }

    pub fn density_universe(&self) -> BTreeSet<DensityBucket> {
        self.screen_density.universe()
    }
}

fn join_values<T: fmt::Display>(values: impl IntoIterator<Item = T>, sep: &str) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(sep)
}

impl fmt::Display for ApkTargeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            return f.write_str("master");
        }
        let mut parts = Vec::new();
        if !self.abi.value.is_empty() {
            parts.push(format!("abi={}", join_values(&self.abi.value, "+")));
        }
        if !self.screen_density.value.is_empty() {
            parts.push(format!(
                "density={}",
                join_values(&self.screen_density.value, "+")
            ));
        }
        if !self.language.value.is_empty() {
            parts.push(format!("lang={}", join_values(&self.language.value, "+")));
        }
        for set in &self.multi_abi.value {
            parts.push(format!("multi_abi={}", join_values(set, ".")));
        }
        if parts.is_empty() {
            // Alternatives only; still targeted.
            parts.push("alternatives-only".to_owned());
        }
        f.write_str(&parts.join(","))
    }
}
