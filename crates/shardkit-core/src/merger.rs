use crate::{check_invariant, ShardError};
use indexmap::IndexMap;
use shardkit_model::{ApkTargeting, ModuleEntry, ModuleSplit};

/// Merge splits of one module that carry identical targeting.
///
/// The result keeps first-occurrence order, for splits and for the entries
/// inside them. An entry path present in two merged splits must have
/// identical content.
pub fn merge_same_targeting(splits: Vec<ModuleSplit>) -> Result<Vec<ModuleSplit>, ShardError> {
    let mut merged: IndexMap<ApkTargeting, (ModuleSplit, IndexMap<String, ModuleEntry>)> =
        IndexMap::new();
    for mut split in splits {
        let incoming = std::mem::take(&mut split.entries);
        let (existing, entries) = merged
            .entry(split.targeting.clone())
            .or_insert_with(|| (split.clone(), IndexMap::new()));
        check_invariant!(
            existing.module_name == split.module_name,
            "Cannot merge splits of different modules: '{}' and '{}'.",
            existing.module_name,
            split.module_name
        );
        for entry in incoming {
            match entries.get(&entry.path) {
                Some(present) => check_invariant!(
                    present.content == entry.content,
                    "Entry '{}' of module '{}' appears twice with different content.",
                    entry.path,
                    existing.module_name
                ),
                None => {
                    entries.insert(entry.path.clone(), entry);
                }
            }
        }
    }
    Ok(merged
        .into_values()
        .map(|(mut split, entries)| {
            split.entries = entries.into_values().collect();
            split
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardkit_model::{Abi, ModuleEntry, ModuleName};

    fn split(module: &str, targeting: ApkTargeting, paths: &[&str]) -> ModuleSplit {
        ModuleSplit::new(
            ModuleName::new(module),
            paths
                .iter()
                .map(|p| ModuleEntry::new(*p, p.as_bytes().to_vec()))
                .collect(),
            targeting,
        )
    }

    #[test]
    fn merges_masters_into_one() {
        let x86 = ApkTargeting::for_abi(Abi::X86, []);
        let out = merge_same_targeting(vec![
            split("base", ApkTargeting::default(), &["lib/README"]),
            split("base", x86.clone(), &["lib/x86/a.so"]),
            split("base", ApkTargeting::default(), &["res/values/strings.xml"]),
            split("base", ApkTargeting::default(), &["dex/classes.dex"]),
        ])
        .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out[0].is_master_split());
        assert_eq!(out[0].entries.len(), 3);
        assert_eq!(out[1].targeting, x86);
    }

    #[test]
    fn merged_entries_keep_first_seen_order() {
        let first: Vec<String> = (0..2000).map(|i| format!("res/raw/{i}")).collect();
        let second: Vec<String> = (1000..3000).map(|i| format!("res/raw/{i}")).collect();
        fn refs(paths: &[String]) -> Vec<&str> {
            paths.iter().map(String::as_str).collect::<Vec<_>>()
        }
        let out = merge_same_targeting(vec![
            split("base", ApkTargeting::default(), &refs(&first)),
            split("base", ApkTargeting::default(), &refs(&second)),
        ])
        .unwrap();

        assert_eq!(out.len(), 1);
        let paths: Vec<&str> = out[0].entries.iter().map(|e| e.path.as_str()).collect();
        let expected: Vec<String> = (0..3000).map(|i| format!("res/raw/{i}")).collect();
        assert_eq!(paths, refs(&expected));
    }

    #[test]
    fn identical_duplicate_entries_collapse() {
        let out = merge_same_targeting(vec![
            split("base", ApkTargeting::default(), &["a"]),
            split("base", ApkTargeting::default(), &["a"]),
        ])
        .unwrap();
        assert_eq!(out[0].entries.len(), 1);
    }

    #[test]
    fn conflicting_duplicate_entries_are_rejected() {
        let mut second = split("base", ApkTargeting::default(), &["a"]);
        second.entries[0].content = b"other".to_vec();
        let err = merge_same_targeting(vec![
            split("base", ApkTargeting::default(), &["a"]),
            second,
        ])
        .unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn refuses_to_merge_across_modules() {
        let err = merge_same_targeting(vec![
            split("base", ApkTargeting::default(), &["a"]),
            split("camera", ApkTargeting::default(), &["b"]),
        ])
        .unwrap_err();
        assert!(err.is_internal());
    }
}
