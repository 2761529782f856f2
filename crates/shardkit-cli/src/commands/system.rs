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
    let Some(device) = loaded.bundle.device.as_ref() else {
        return Err(format!(
            "manifest error: system sharding requires a [device] section in {}",
            manifest.display()
        ));
    };
    let (dimensions, options) = sharding.resolve(&loaded);
    let sharder = BundleSharder::new(options);

    let out = with_spinner(json, "generating system image...", "system image generated", || {
        sharder.shard_for_system_apps(&loaded.modules, &dimensions, &loaded.metadata, device)
    })?;
    let refs: Vec<&ShardedApk> = std::iter::once(&out.system_image)
        .chain(&out.additional_splits)
        .collect();
    let written = match output {
        Some(dir) => write_packages(dir, &refs)?,
        None => Vec::new(),
    };

    if json {
        let payload = serde_json::json!({
            "device": device,
            "system_image": out.system_image.summary(),
            "additional_splits": out
                .additional_splits
                .iter()
                .map(ShardedApk::summary)
                .collect::<Vec<_>>(),
            "written": written,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "system image {} with {} additional split(s)",
            out.system_image.short_id(),
            out.additional_splits.len()
        );
        print_apk_table(&refs);
        if let Some(dir) = output {
            println!("wrote {} package(s) to {}", written.len(), dir.display());
        }
    }
    Ok(EXIT_SUCCESS)
}
