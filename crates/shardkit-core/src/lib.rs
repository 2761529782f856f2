//! Shard generation core for shardkit.
//!
//! Modules are split along the enabled optimization dimensions (`pipeline`,
//! `splitters`), same-targeting splits are merged (`merger`), and the splits
//! of all modules are grouped into shard definitions by a cartesian product
//! over ABI and screen density (`grouping`). The `BundleSharder` ties this
//! together for general sharding, single-device system images and APEX
//! modules, handing every shard definition to a `ShardMerger` (`fusing`).

pub mod fusing;
pub mod grouping;
pub mod matcher;
pub mod merger;
pub mod pipeline;
pub mod sharder;
pub mod splitters;

pub use fusing::{
    FusingShardMerger, ShardMerger, ShardSummary, ShardedApk, ShardedSystemSplits, METADATA_DIR,
};
pub use grouping::{group_splits_for_apex, group_splits_to_shards, DeviceFilter, ShardDefinition};
pub use matcher::{DeviceMatcher, TargetingMatcher};
pub use merger::merge_same_targeting;
pub use pipeline::{generate_splits, SplittingPipeline};
pub use sharder::BundleSharder;
pub use splitters::SplitterKind;

use thiserror::Error;

/// Malformed module content found while splitting.
#[derive(Debug, Error)]
pub enum SplitterError {
    #[error("unknown ABI directory in native library path '{0}'")]
    UnknownAbiDirectory(String),
    #[error("malformed APEX image name '{0}', expected apex/<abi>[.<abi>...].img")]
    MalformedApexImage(String),
}

#[derive(Debug, Error)]
pub enum ShardError {
    /// The modules disagree on the ABIs they ship; fixable by the caller.
    #[error(
        "Modules for standalone APKs must cover the same ABIs when optimizing for ABI. \
         Found ABI sets: {universes}"
    )]
    AbiUniverseMismatch { universes: String },
    #[error("splitter error: {0}")]
    Splitter(#[from] SplitterError),
    #[error("conflicting content for entry '{path}' while fusing shard {shard}")]
    ConflictingEntry { path: String, shard: String },
    /// A broken internal contract, typically a misbehaving splitter.
    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl ShardError {
    /// True for defect-level failures, false for errors caused by the input.
    pub fn is_internal(&self) -> bool {
        matches!(self, ShardError::InvariantViolation(_))
    }
}

/// Return `ShardError::InvariantViolation` with the formatted message unless
/// the condition holds.
macro_rules! check_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::ShardError::InvariantViolation(format!($($arg)+)));
        }
    };
}
pub(crate) use check_invariant;

/// Apply `f` to every item on its own scoped thread; results keep item order.
pub(crate) fn map_scoped<T, R, F>(items: &[T], f: F) -> Result<Vec<R>, ShardError>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> Result<R, ShardError> + Sync,
{
    if items.len() <= 1 {
        return items.iter().map(&f).collect();
    }
    let joined: Vec<Result<R, ShardError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .iter()
            .map(|item| {
                let f = &f;
                scope.spawn(move || f(item))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(ShardError::InvariantViolation(
                        "sharding worker thread panicked".to_owned(),
                    ))
                })
            })
            .collect()
    });
    joined.into_iter().collect()
}
