//! Pattern-based selection over the catalog

use glob::Pattern;

use crate::catalog::Example;

/// Filter the catalog by user-supplied patterns.
///
/// Empty patterns select everything. Otherwise an example is selected
/// when any pattern is a literal substring of its id or matches it as a
/// shell glob; the two checks are a union, not exclusive.
pub fn select(catalog: &[Example], patterns: &[String]) -> Vec<Example> {
    if patterns.is_empty() {
        return catalog.to_vec();
    }

    catalog
        .iter()
        .filter(|example| {
            let id = example.id();
            patterns.iter().any(|p| {
                id.contains(p.as_str())
                    || Pattern::new(p).map(|g| g.matches(&id)).unwrap_or(false)
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Flags, Kind};
    use std::path::PathBuf;

    fn example(path: &str) -> Example {
        Example {
            path: PathBuf::from(path),
            flags: Flags::new(path, Kind::File, false).unwrap(),
        }
    }

    fn ids(examples: &[Example]) -> Vec<String> {
        examples.iter().map(|e| e.id()).collect()
    }

    fn fixture() -> Vec<Example> {
        vec![
            example("gallery/plots/scatter.py"),
            example("gallery/plots/line.py"),
            example("gallery/apps/sliders_server.py"),
        ]
    }

    #[test]
    fn test_empty_patterns_select_all() {
        let all = fixture();
        assert_eq!(ids(&select(&all, &[])), ids(&all));
    }

    #[test]
    fn test_substring_match() {
        let selected = select(&fixture(), &["scatter".to_string()]);
        assert_eq!(ids(&selected), vec!["gallery/plots/scatter.py"]);
    }

    #[test]
    fn test_glob_match() {
        let selected = select(&fixture(), &["gallery/plots/*.py".to_string()]);
        assert_eq!(
            ids(&selected),
            vec!["gallery/plots/scatter.py", "gallery/plots/line.py"]
        );
    }

    #[test]
    fn test_union_of_substring_and_glob() {
        let selected = select(
            &fixture(),
            &["*server*".to_string(), "line".to_string()],
        );
        assert_eq!(
            ids(&selected),
            vec!["gallery/plots/line.py", "gallery/apps/sliders_server.py"]
        );
    }

    #[test]
    fn test_idempotent() {
        let all = fixture();
        let patterns = vec!["plots".to_string()];
        let once = select(&all, &patterns);
        let twice = select(&once, &patterns);
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn test_invalid_glob_still_substring_matches() {
        let all = vec![example("gallery/odd/a[b.py")];
        let selected = select(&all, &["a[b".to_string()]);
        assert_eq!(selected.len(), 1);
    }
}
