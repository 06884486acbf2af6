//! Local cache of previously downloaded, license-cleared images,
//! organized by category: `<cache_dir>/<category-slug>/*.{jpg,png,webp,svg}`.

use std::path::{Path, PathBuf};

use crate::util::slugify;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "svg"];

pub struct LocalImageCache {
    dir: PathBuf,
}

impl LocalImageCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Cached images for a category, sorted by file name so repeated
    /// lookups walk candidates in a stable order. Missing directory is
    /// just an empty cache.
    pub fn lookup(&self, category: &str) -> Vec<PathBuf> {
        let dir = self.dir.join(slugify(category));
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            })
            .collect();
        paths.sort();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_category_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalImageCache::new(dir.path());
        assert!(cache.lookup("networking").is_empty());
    }

    #[test]
    fn lookup_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let category = dir.path().join("networking");
        std::fs::create_dir_all(&category).unwrap();
        std::fs::write(category.join("b.png"), b"png").unwrap();
        std::fs::write(category.join("a.jpg"), b"jpg").unwrap();
        std::fs::write(category.join("notes.txt"), b"txt").unwrap();

        let cache = LocalImageCache::new(dir.path());
        let paths = cache.lookup("Networking");
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("a.jpg"));
        assert!(paths[1].ends_with("b.png"));
    }
}
