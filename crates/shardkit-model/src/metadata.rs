use std::collections::BTreeMap;

/// Bundle-level metadata files attached to every produced package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleMetadata {
    files: BTreeMap<String, Vec<u8>>,
}

impl BundleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.add_file(path, content);
        self
    }

    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_iterate_in_path_order() {
        let meta = BundleMetadata::new()
            .with_file("z/last", b"1".to_vec())
            .with_file("a/first", b"2".to_vec());
        let paths: Vec<&str> = meta.files().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["a/first", "z/last"]);
        assert_eq!(meta.len(), 2);
        assert!(BundleMetadata::new().is_empty());
    }
}
