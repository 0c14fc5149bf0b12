use ignore::WalkBuilder;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Finds every file under `root` whose path relative to `root` ends with the
/// components of `file`, so `hero.png` matches `a/hero.png` but not
/// `a/superhero.png`.
///
/// Hidden files and anything excluded by `.gitignore`/`.ignore` files are
/// skipped. Results are relative to `root` and sorted.
pub fn find_by_suffix(root: &Path, file: &str) -> Vec<PathBuf> {
    let wanted: Vec<Component<'_>> = Path::new(file)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if wanted.is_empty() {
        return Vec::new();
    }

    let mut found = BTreeSet::new();
    let walker = WalkBuilder::new(root).require_git(false).build();

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let components: Vec<Component<'_>> = relative.components().collect();
        if components.ends_with(&wanted) {
            found.insert(relative.to_path_buf());
        }
    }

    found.into_iter().collect()
}
