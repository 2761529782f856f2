use crate::manifest::{parse_manifest_file, ManifestError};
use crate::metadata::BundleMetadata;
use crate::module::{BundleModule, ModuleEntry};
use crate::normalize::NormalizedBundle;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A bundle manifest together with the module contents it points at.
#[derive(Debug, Clone)]
pub struct LoadedBundle {
    pub bundle: NormalizedBundle,
    pub modules: Vec<BundleModule>,
    pub metadata: BundleMetadata,
}

impl LoadedBundle {
    pub fn module(&self, name: &str) -> Option<&BundleModule> {
        self.modules.iter().find(|m| m.name == *name)
    }
}

/// Parse and normalize a manifest, then read every module directory and
/// metadata file it declares. Paths resolve relative to the manifest.
pub fn load_bundle(manifest_path: &Path) -> Result<LoadedBundle, ManifestError> {
    let bundle = parse_manifest_file(manifest_path)?.normalize()?;
    let base_dir = manifest_path.parent().unwrap_or(Path::new("."));

    let mut modules = Vec::with_capacity(bundle.modules.len());
    for module in &bundle.modules {
        let dir = base_dir.join(&module.path);
        if !dir.is_dir() {
            return Err(ManifestError::ModuleDirMissing(dir));
        }
        let entries = read_module_dir(&dir)?;
        debug!("module '{}': {} entries", module.name, entries.len());
        modules.push(
            BundleModule::new(module.name.clone(), entries).with_fusing(module.include_in_fusing),
        );
    }

    let mut metadata = BundleMetadata::new();
    for file in &bundle.metadata {
        let content = fs::read(base_dir.join(&file.source))?;
        metadata.add_file(file.path.clone(), content);
    }

    Ok(LoadedBundle {
        bundle,
        modules,
        metadata,
    })
}

/// Read all regular files below `dir` as module entries with `/`-separated
/// relative paths, sorted by path.
pub fn read_module_dir(dir: &Path) -> Result<Vec<ModuleEntry>, ManifestError> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut entries = Vec::with_capacity(files.len());
    for (rel, full) in files {
        entries.push(ModuleEntry::new(rel, fs::read(&full)?));
    }
    Ok(entries)
}

fn collect_files(
    root: &Path,
    current: &Path,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), ManifestError> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let full = entry.path();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            collect_files(root, &full, out)?;
        } else if ft.is_file() {
            let rel = full
                .strip_prefix(root)
                .map_err(|e| std::io::Error::other(format!("path strip: {e}")))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            out.push((rel, full));
        } else {
            debug!("skipping non-regular file {}", full.display());
        }
    }
    Ok(())
}
