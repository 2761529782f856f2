use super::{colorize_targeting, json_pretty, load, shard_error, ShardingArgs, EXIT_SUCCESS};
use shardkit_core::BundleSharder;
use std::path::Path;

pub fn run(manifest: &Path, sharding: &ShardingArgs, json: bool) -> Result<u8, String> {
    let loaded = load(manifest)?;
    let (dimensions, options) = sharding.resolve(&loaded);
    let shards = BundleSharder::new(options)
        .plan_shards(&loaded.modules, &dimensions)
        .map_err(|e| shard_error(&e))?;

    if json {
        let payload: Vec<serde_json::Value> = shards
            .iter()
            .enumerate()
            .map(|(index, shard)| {
                let splits: Vec<serde_json::Value> = shard
                    .iter()
                    .map(|split| {
                        serde_json::json!({
                            "module": split.module_name,
                            "targeting": split.targeting.to_string(),
                            "master": split.master,
                            "entries": split.entry_paths().collect::<Vec<_>>(),
                        })
                    })
                    .collect();
                serde_json::json!({ "index": index, "splits": splits })
            })
            .collect();
        println!("{}", json_pretty(&payload)?);
    } else {
        for (index, shard) in shards.iter().enumerate() {
            println!("shard {index}:");
            for split in shard {
                println!(
                    "  {:<16} {:<32} {} entries",
                    split.module_name.as_str(),
                    colorize_targeting(&split.targeting),
                    split.entries.len()
                );
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
