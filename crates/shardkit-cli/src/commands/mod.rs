pub mod apex;
pub mod completions;
pub mod man_pages;
pub mod plan;
pub mod shard;
pub mod system;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use shardkit_core::{ShardError, ShardedApk};
use shardkit_model::{
    load_bundle, ApkTargeting, LoadedBundle, ManifestError, OptimizationDimension,
    ShardingOptions,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_INVALID_BUNDLE: u8 = 3;
pub const EXIT_INTERNAL_ERROR: u8 = 4;

/// Command-line overrides of the manifest's `[sharding]` section.
#[derive(Debug, Clone, Default, Args)]
pub struct ShardingArgs {
    /// Comma-separated dimensions to optimize for (abi, screen_density, language).
    #[arg(long, value_delimiter = ',')]
    pub dimensions: Option<Vec<OptimizationDimension>>,
    /// Keep language resources and assets in the master split.
    #[arg(long, default_value_t = false)]
    pub no_language_split: bool,
    /// Drop 64-bit native libraries instead of producing 64-bit shards.
    #[arg(long = "no-64-bit", default_value_t = false)]
    pub no_64_bit: bool,
}

impl ShardingArgs {
    pub fn resolve(
        &self,
        loaded: &LoadedBundle,
    ) -> (BTreeSet<OptimizationDimension>, ShardingOptions) {
        let dimensions = match &self.dimensions {
            Some(dims) => dims.iter().copied().collect(),
            None => loaded.bundle.dimensions.clone(),
        };
        let mut options = loaded.bundle.options;
        if self.no_language_split {
            options.split_by_language = false;
        }
        if self.no_64_bit {
            options.generate_64_bit_shard = false;
        }
        (dimensions, options)
    }
}

pub fn load(manifest: &Path) -> Result<LoadedBundle, String> {
    load_bundle(manifest).map_err(|e| manifest_error(&e))
}

pub fn manifest_error(e: &ManifestError) -> String {
    format!("manifest error: {e}")
}

pub fn shard_error(e: &ShardError) -> String {
    if e.is_internal() {
        format!("internal error: {e}")
    } else {
        format!("invalid bundle: {e}")
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Run `f` behind a spinner unless JSON output is requested.
pub fn with_spinner<T>(
    json: bool,
    msg: &str,
    done: &str,
    f: impl FnOnce() -> Result<T, ShardError>,
) -> Result<T, String> {
    let pb = if json { None } else { Some(spinner(msg)) };
    match f() {
        Ok(v) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, done);
            }
            Ok(v)
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "sharding failed");
            }
            Err(shard_error(&e))
        }
    }
}

pub fn colorize_targeting(targeting: &ApkTargeting) -> String {
    use console::Style;
    let text = targeting.to_string();
    if targeting.is_default() {
        Style::new().dim().apply_to(text).to_string()
    } else if targeting.has_multi_abi_targeting() {
        Style::new().magenta().apply_to(text).to_string()
    } else {
        Style::new().cyan().apply_to(text).to_string()
    }
}

pub fn print_apk_table(apks: &[&ShardedApk]) {
    println!(
        "{:<14} {:<32} {:>8} {:>10} MODULES",
        "SHARD_ID", "TARGETING", "ENTRIES", "BYTES"
    );
    for apk in apks {
        let modules: Vec<&str> = apk.modules.iter().map(|m| m.as_str()).collect();
        println!(
            "{:<14} {:<32} {:>8} {:>10} {}",
            apk.short_id(),
            colorize_targeting(&apk.targeting),
            apk.entries.len(),
            apk.total_size(),
            modules.join(",")
        );
    }
}

/// Write each package as `<shard_id>.tar`. Entries are stored in path order
/// with zeroed ownership and timestamps, so equal packages give equal files.
pub fn write_packages(dir: &Path, apks: &[&ShardedApk]) -> Result<Vec<PathBuf>, String> {
    fs::create_dir_all(dir).map_err(|e| format!("failed to create {}: {e}", dir.display()))?;
    let mut written = Vec::with_capacity(apks.len());
    for apk in apks {
        let path = dir.join(format!("{}.tar", apk.id));
        let bytes = package_tar(apk).map_err(|e| format!("failed to pack {}: {e}", apk.id))?;
        fs::write(&path, bytes).map_err(|e| format!("failed to write {}: {e}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

fn package_tar(apk: &ShardedApk) -> std::io::Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    for entry in &apk.entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(entry.content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, &entry.path, entry.content.as_slice())?;
    }
    builder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkit_model::{Abi, ModuleEntry, ModuleName, ShardId};
    use std::io::Read;

    fn apk(id: &str, entries: &[(&str, &str)]) -> ShardedApk {
        ShardedApk {
            id: ShardId::new(id),
            targeting: ApkTargeting::for_abi(Abi::X86, []),
            modules: vec![ModuleName::new("base")],
            entries: entries
                .iter()
                .map(|(p, c)| ModuleEntry::new(*p, c.as_bytes().to_vec()))
                .collect(),
        }
    }

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn shard_errors_map_to_prefixes() {
        let user = ShardError::AbiUniverseMismatch {
            universes: "{x86}, {arm64-v8a, x86}".to_owned(),
        };
        assert!(shard_error(&user).starts_with("invalid bundle:"));
        let internal = ShardError::InvariantViolation("Expected one master split, got 2.".into());
        assert!(shard_error(&internal).starts_with("internal error:"));
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_MANIFEST_ERROR,
            EXIT_INVALID_BUNDLE,
            EXIT_INTERNAL_ERROR,
        ];
        let unique: BTreeSet<u8> = codes.into_iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn colorize_targeting_keeps_text() {
        assert!(colorize_targeting(&ApkTargeting::default()).contains("master"));
        assert!(colorize_targeting(&ApkTargeting::for_abi(Abi::X86, [])).contains("abi=x86"));
    }

    #[test]
    fn packages_are_written_deterministically() {
        let dir = tempfile::tempdir().unwrap();
        let a = apk("aaaa", &[("dex/classes.dex", "dex"), ("lib/x86/a.so", "so")]);
        let first = write_packages(&dir.path().join("one"), &[&a]).unwrap();
        let second = write_packages(&dir.path().join("two"), &[&a]).unwrap();
        assert_eq!(first[0].file_name().unwrap(), "aaaa.tar");
        assert_eq!(
            fs::read(&first[0]).unwrap(),
            fs::read(&second[0]).unwrap()
        );

        let mut archive = tar::Archive::new(fs::File::open(&first[0]).unwrap());
        let mut seen = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            seen.push((path, content));
        }
        assert_eq!(
            seen,
            vec![
                ("dex/classes.dex".to_owned(), "dex".to_owned()),
                ("lib/x86/a.so".to_owned(), "so".to_owned())
            ]
        );
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
    }
}
