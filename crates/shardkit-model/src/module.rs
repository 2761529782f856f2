use crate::types::ModuleName;

/// One file of a bundle module. Content is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEntry {
    pub path: String,
    pub content: Vec<u8>,
}

impl ModuleEntry {
    pub fn new(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Blake3 hex digest of the entry content.
    pub fn digest(&self) -> String {
        blake3::hash(&self.content).to_hex().to_string()
    }

    pub fn category(&self) -> ContentCategory {
        ContentCategory::of(&self.path)
    }
}

/// Content categories of a module, each split by its own pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCategory {
    NativeLibraries,
    Resources,
    Assets,
    ApexImages,
    Dex,
    Root,
}

impl ContentCategory {
    pub fn of(path: &str) -> Self {
        if path.starts_with("lib/") {
            ContentCategory::NativeLibraries
        } else if path.starts_with("res/") || path == "resources.pb" {
            ContentCategory::Resources
        } else if path.starts_with("assets/") {
            ContentCategory::Assets
        } else if path.starts_with("apex/") {
            ContentCategory::ApexImages
        } else if path.starts_with("dex/")
            || (path.ends_with(".dex") && !path.contains('/'))
        {
            ContentCategory::Dex
        } else {
            ContentCategory::Root
        }
    }
}

/// An input build unit of a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleModule {
    pub name: ModuleName,
    pub entries: Vec<ModuleEntry>,
    /// Whether the module is fused unconditionally into a system image.
    pub include_in_fusing: bool,
}

impl BundleModule {
    pub fn new(name: impl Into<ModuleName>, entries: Vec<ModuleEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
            include_in_fusing: true,
        }
    }

    #[must_use]
    pub fn with_fusing(mut self, include_in_fusing: bool) -> Self {
        self.include_in_fusing = include_in_fusing;
        self
    }

    pub fn is_base(&self) -> bool {
        self.name == *"base"
    }

    pub fn entries_in(&self, category: ContentCategory) -> Vec<ModuleEntry> {
        self.entries
            .iter()
            .filter(|e| e.category() == category)
            .cloned()
            .collect()
    }
}
