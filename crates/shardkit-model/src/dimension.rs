use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A targeting dimension the caller asks to optimize for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationDimension {
    Abi,
    ScreenDensity,
    Language,
}

impl OptimizationDimension {
    pub const ALL: [OptimizationDimension; 3] = [
        OptimizationDimension::Abi,
        OptimizationDimension::ScreenDensity,
        OptimizationDimension::Language,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OptimizationDimension::Abi => "abi",
            OptimizationDimension::ScreenDensity => "screen_density",
            OptimizationDimension::Language => "language",
        }
    }
}

impl fmt::Display for OptimizationDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationDimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "abi" => Ok(OptimizationDimension::Abi),
            "screen_density" | "density" => Ok(OptimizationDimension::ScreenDensity),
            "language" => Ok(OptimizationDimension::Language),
            other => Err(format!(
                "unknown optimization dimension '{other}', expected one of: abi, screen_density, language"
            )),
        }
    }
}

/// Sharding policy shared by every entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingOptions {
    /// Extract language resources and assets into language splits.
    pub split_by_language: bool,
    /// Keep 64-bit native libraries, producing 64-bit ABI shards.
    pub generate_64_bit_shard: bool,
}

impl Default for ShardingOptions {
    fn default() -> Self {
        Self {
            split_by_language: true,
            generate_64_bit_shard: true,
        }
    }
}
