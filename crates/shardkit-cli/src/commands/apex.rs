use super::{json_pretty, load, print_apk_table, with_spinner, write_packages, EXIT_SUCCESS};
use shardkit_core::{BundleSharder, ShardedApk};
use std::path::Path;

pub fn run(manifest: &Path, module: &str, output: Option<&Path>, json: bool) -> Result<u8, String> {
    let loaded = load(manifest)?;
    let apex = loaded
        .module(module)
        .ok_or_else(|| format!("manifest error: no module named '{module}'"))?;
    let sharder = BundleSharder::new(loaded.bundle.options);

    let apks = with_spinner(json, "generating APEX shards...", "APEX shards generated", || {
        sharder.shard_apex_bundle(apex)
    })?;
    let refs: Vec<&ShardedApk> = apks.iter().collect();
    let written = match output {
        Some(dir) => write_packages(dir, &refs)?,
        None => Vec::new(),
    };

    if json {
        let payload = serde_json::json!({
            "module": module,
            "shards": apks.iter().map(ShardedApk::summary).collect::<Vec<_>>(),
            "written": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} APEX shard(s) for '{module}'", apks.len());
        print_apk_table(&refs);
        if let Some(dir) = output {
            println!("wrote {} package(s) to {}", written.len(), dir.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
