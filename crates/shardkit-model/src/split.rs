use crate::module::{BundleModule, ContentCategory, ModuleEntry};
use crate::targeting::ApkTargeting;
use crate::types::{ModuleName, SplitName};

/// A fragment of one module: a set of entries plus the targeting they serve.
///
/// `master` is true iff the targeting is the default descriptor. Splits are
/// value objects; for partitioning purposes their identity is the targeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSplit {
    pub module_name: ModuleName,
    pub entries: Vec<ModuleEntry>,
    pub targeting: ApkTargeting,
    pub master: bool,
    pub split_name: Option<SplitName>,
}

impl ModuleSplit {
    pub fn new(
        module_name: ModuleName,
        entries: Vec<ModuleEntry>,
        targeting: ApkTargeting,
    ) -> Self {
        let master = targeting.is_default();
        Self {
            module_name,
            entries,
            targeting,
            master,
            split_name: None,
        }
    }

    /// Untargeted split holding one content category of `module`.
    pub fn for_category(module: &BundleModule, category: ContentCategory) -> Self {
        let mut split = Self::new(
            module.name.clone(),
            module.entries_in(category),
            ApkTargeting::default(),
        );
        if !module.is_base() {
            split.split_name = Some(SplitName::new(module.name.as_str()));
        }
        split
    }

    pub fn for_native_libraries(module: &BundleModule) -> Self {
        Self::for_category(module, ContentCategory::NativeLibraries)
    }

    pub fn for_resources(module: &BundleModule) -> Self {
        Self::for_category(module, ContentCategory::Resources)
    }

    pub fn for_assets(module: &BundleModule) -> Self {
        Self::for_category(module, ContentCategory::Assets)
    }

    pub fn for_apex(module: &BundleModule) -> Self {
        Self::for_category(module, ContentCategory::ApexImages)
    }

    pub fn for_dex(module: &BundleModule) -> Self {
        Self::for_category(module, ContentCategory::Dex)
    }

    pub fn for_root(module: &BundleModule) -> Self {
        Self::for_category(module, ContentCategory::Root)
    }

    /// A sibling split of the same module with other entries and targeting.
    pub fn derive(&self, entries: Vec<ModuleEntry>, targeting: ApkTargeting) -> Self {
        let mut split = Self::new(self.module_name.clone(), entries, targeting);
        split.split_name.clone_from(&self.split_name);
        split
    }

    #[must_use]
    pub fn remove_split_name(mut self) -> Self {
        self.split_name = None;
        self
    }

    pub fn is_master_split(&self) -> bool {
        self.master
    }

    pub fn entry_paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.path.as_str())
    }
}
