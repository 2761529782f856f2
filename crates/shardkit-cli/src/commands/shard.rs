use super::{
    json_pretty, load, print_apk_table, with_spinner, write_packages, ShardingArgs, EXIT_SUCCESS,
};
use shardkit_core::{BundleSharder, ShardedApk};
use std::path::Path;

pub fn run(
    manifest: &Path,
    sharding: &ShardingArgs,
    output: Option<&Path>,
    json: bool,
) -> Result<u8, String> {
    let loaded = load(manifest)?;
    let (dimensions, options) = sharding.resolve(&loaded);
    let sharder = BundleSharder::new(options);

    let apks = with_spinner(json, "generating shards...", "shards generated", || {
        sharder.shard_bundle(&loaded.modules, &dimensions, &loaded.metadata)
    })?;
    let refs: Vec<&ShardedApk> = apks.iter().collect();
    let written = match output {
        Some(dir) => write_packages(dir, &refs)?,
        None => Vec::new(),
    };

    if json {
        let payload = serde_json::json!({
            "dimensions": dimensions,
            "shards": apks.iter().map(ShardedApk::summary).collect::<Vec<_>>(),
            "written": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} shard(s)", apks.len());
        print_apk_table(&refs);
        if let Some(dir) = output {
            println!("wrote {} package(s) to {}", written.len(), dir.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
