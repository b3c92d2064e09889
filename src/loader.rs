//! Loading parsed declaration trees from disk
//!
//! The IDL parser runs elsewhere and writes one JSON declaration tree per
//! source file. A [`SourceSet`] names the trees of one schema version
//! explicitly: an include root and the files under it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{CompatError, Result};
use crate::model::FileTree;

/// Extension of serialized declaration trees
pub const TREE_EXTENSION: &str = "json";

/// The declaration-tree files of one side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl SourceSet {
    /// Explicit file set, paths relative to `root`
    pub fn new(root: impl Into<PathBuf>, files: Vec<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files,
        }
    }

    /// Every declaration tree below `root`, in path order
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let mut files = Vec::new();

        for entry in WalkDir::new(&root).follow_links(true) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
                CompatError::Io { path, source }
            })?;

            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TREE_EXTENSION)
            {
                continue;
            }

            if let Ok(relative) = path.strip_prefix(&root) {
                files.push(relative.to_path_buf());
            }
        }

        files.sort();
        debug!(root = %root.display(), count = files.len(), "discovered declaration trees");
        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Read and deserialize every tree in the set
    pub fn load(&self) -> Result<Vec<FileTree>> {
        let trees = self
            .files
            .iter()
            .map(|relative| self.load_one(relative))
            .collect::<Result<Vec<_>>>()?;

        info!(root = %self.root.display(), files = trees.len(), "loaded declaration trees");
        Ok(trees)
    }

    fn load_one(&self, relative: &Path) -> Result<FileTree> {
        let path = self.root.join(relative);
        let content = fs::read_to_string(&path).map_err(|source| CompatError::Io {
            path: path.clone(),
            source,
        })?;

        let mut tree: FileTree =
            serde_json::from_str(&content).map_err(|source| CompatError::Parse { path, source })?;

        if tree.path.is_empty() {
            tree.path = relative.to_string_lossy().into_owned();
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_discover_finds_nested_trees_in_order() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.json", "{}");
        write(dir.path(), "shared/a.json", "{}");
        write(dir.path(), "notes.txt", "ignored");

        let set = SourceSet::discover(dir.path()).unwrap();
        assert_eq!(
            set.files(),
            &[PathBuf::from("b.json"), PathBuf::from("shared/a.json")]
        );
    }

    #[test]
    fn test_load_stamps_relative_path() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "api.json",
            r#"{ "structs": { "Foo": { "name": "Foo", "fields": [
                { "id": 1, "name": "bar", "type": { "name": "i32" } }
            ] } } }"#,
        );

        let trees = SourceSet::discover(dir.path()).unwrap().load().unwrap();
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].path, "api.json");
        assert_eq!(trees[0].structs["Foo"].fields[0].name, "bar");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let dir = tempdir().unwrap();
        let set = SourceSet::new(dir.path(), vec![PathBuf::from("absent.json")]);

        match set.load() {
            Err(CompatError::Io { path, .. }) => assert!(path.ends_with("absent.json")),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_type_is_a_parse_error() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "bad.json",
            r#"{ "typedefs": { "Names": { "name": "Names", "type": { "name": "list" } } } }"#,
        );

        let set = SourceSet::discover(dir.path()).unwrap();
        match set.load() {
            Err(CompatError::Parse { source, .. }) => {
                assert!(source.to_string().contains("missing its value type"));
            }
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }
}
