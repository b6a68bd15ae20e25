//! TOML tree merging.

/// Recursively deep-merge `overlay` into `base`.
///
/// - Tables merge recursively per-field.
/// - Scalars and arrays from the overlay **replace** the base value.
pub(crate) fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
        },
    }
}

/// Whether the dotted `path` (e.g. `sync.interval_secs`) is present in `tree`.
pub(crate) fn has_path(tree: &toml::Value, path: &str) -> bool {
    let mut current = tree;
    for segment in path.split('.') {
        match current.as_table().and_then(|t| t.get(segment)) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

/// Set the dotted `path` in `tree`, creating intermediate tables.
pub(crate) fn set_path(tree: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = tree;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment.to_owned())
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_deep_merge_tables_and_scalars() {
        let mut base = parse("[sync]\ninterval_secs = 30\nsync_on_capture = true\n");
        let overlay = parse("[sync]\ninterval_secs = 5\n[remote]\nbase_url = \"x\"\n");
        deep_merge(&mut base, &overlay);
        assert_eq!(base["sync"]["interval_secs"].as_integer(), Some(5));
        assert_eq!(base["sync"]["sync_on_capture"].as_bool(), Some(true));
        assert_eq!(base["remote"]["base_url"].as_str(), Some("x"));
    }

    #[test]
    fn test_arrays_replace() {
        let mut base = parse("[policy]\nexcluded_modules = [\"a\", \"b\"]\n");
        deep_merge(&mut base, &parse("[policy]\nexcluded_modules = [\"c\"]\n"));
        assert_eq!(base["policy"]["excluded_modules"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_paths() {
        let mut tree = parse("[storage]\ncache_bound = 3\n");
        assert!(has_path(&tree, "storage.cache_bound"));
        assert!(!has_path(&tree, "storage.directory"));
        set_path(&mut tree, "remote.api_token", toml::Value::String("t".into()));
        assert!(has_path(&tree, "remote.api_token"));
    }
}
