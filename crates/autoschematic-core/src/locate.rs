//! Schematic file resolution.
//!
//! A name resolves, first match wins, to:
//!
//! 1. `<root>/<name>` when that file exists;
//! 2. `<root>/<folder>/<name>` when `name` already has a recognised
//!    extension;
//! 3. `<root>/<folder>/<name>.<ext>` for each recognised extension, in
//!    [`SCHEMATIC_EXTENSIONS`] order.
//!
//! Failing all three yields [`PasteError::NotFound`], which callers keep
//! distinct from decode failures.

use std::path::{Component, Path, PathBuf};

use crate::error::PasteError;

/// Recognised extensions in resolution priority order.
pub const SCHEMATIC_EXTENSIONS: [&str; 2] = ["schematic", "schem"];

/// Resolves schematic names against an installation root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchematicLocator {
    root: PathBuf,
    folder: PathBuf,
}

impl SchematicLocator {
    /// Locator for `<root>/<folder>`.
    pub fn new(root: impl Into<PathBuf>, folder: impl AsRef<Path>) -> Self {
        let root = root.into();
        let folder = root.join(folder);
        Self { root, folder }
    }

    /// Installation root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Schematics folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Create the schematics folder if it is missing.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the folder cannot be created.
    pub fn ensure_folder(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.folder)
    }

    /// Resolve `name` to an existing file.
    ///
    /// Names that are absolute or climb out of the root with `..` never
    /// resolve.
    ///
    /// # Errors
    ///
    /// Returns [`PasteError::NotFound`] listing every candidate checked.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, PasteError> {
        let not_found = |tried: Vec<PathBuf>| PasteError::NotFound {
            name: name.to_owned(),
            tried,
        };
        if name.is_empty() || !is_contained(Path::new(name)) {
            return Err(not_found(Vec::new()));
        }

        let mut tried = Vec::new();

        let exact = self.root.join(name);
        if exact.is_file() {
            return Ok(exact);
        }
        tried.push(exact);

        if has_schematic_extension(Path::new(name)) {
            let candidate = self.folder.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            tried.push(candidate);
            return Err(not_found(tried));
        }

        for ext in SCHEMATIC_EXTENSIONS {
            let candidate = self.folder.join(format!("{name}.{ext}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
            tried.push(candidate);
        }
        Err(not_found(tried))
    }

    /// Sorted stems of the schematics in the folder, one per file. A stem
    /// present under both extensions is listed twice.
    ///
    /// Returns an empty list if the folder does not exist.
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.folder) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_schematic_extension(path))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        names
    }
}

/// Whether `path` ends in one of [`SCHEMATIC_EXTENSIONS`].
pub fn has_schematic_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SCHEMATIC_EXTENSIONS.contains(&ext))
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, SchematicLocator) {
        let dir = tempfile::tempdir().unwrap();
        let locator = SchematicLocator::new(dir.path(), "schematics");
        locator.ensure_folder().unwrap();
        (dir, locator)
    }

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn exact_path_under_root_wins() {
        let (dir, locator) = setup();
        touch(&dir.path().join("custom.bin"));
        assert_eq!(locator.resolve("custom.bin").unwrap(), dir.path().join("custom.bin"));
    }

    #[test]
    fn exact_path_may_point_into_the_folder() {
        let (_dir, locator) = setup();
        touch(&locator.folder().join("spawn.schem"));
        let resolved = locator.resolve("schematics/spawn.schem").unwrap();
        assert_eq!(resolved, locator.folder().join("spawn.schem"));
    }

    #[test]
    fn name_with_extension_is_looked_up_in_folder() {
        let (_dir, locator) = setup();
        touch(&locator.folder().join("tower.schem"));
        assert_eq!(locator.resolve("tower.schem").unwrap(), locator.folder().join("tower.schem"));
    }

    #[test]
    fn name_with_extension_does_not_try_other_extensions() {
        let (_dir, locator) = setup();
        touch(&locator.folder().join("tower.schematic"));
        let err = locator.resolve("tower.schem").unwrap_err();
        assert!(matches!(err, PasteError::NotFound { .. }));
    }

    #[test]
    fn schematic_extension_has_priority_over_schem() {
        let (_dir, locator) = setup();
        touch(&locator.folder().join("spawn.schematic"));
        touch(&locator.folder().join("spawn.schem"));
        assert_eq!(
            locator.resolve("spawn").unwrap(),
            locator.folder().join("spawn.schematic")
        );
    }

    #[test]
    fn falls_back_to_schem() {
        let (_dir, locator) = setup();
        touch(&locator.folder().join("spawn.schem"));
        assert_eq!(locator.resolve("spawn").unwrap(), locator.folder().join("spawn.schem"));
    }

    #[test]
    fn missing_file_reports_name_and_candidates() {
        let (_dir, locator) = setup();
        let err = locator.resolve("spawn").unwrap_err();
        assert!(err.to_string().contains("spawn"));
        let expected_last = locator.folder().join("spawn.schem");
        assert!(matches!(
            &err,
            PasteError::NotFound { name, tried }
                if name == "spawn" && tried.len() == 3 && tried.last() == Some(&expected_last)
        ));
    }

    #[test]
    fn escaping_names_never_resolve() {
        let (dir, locator) = setup();
        touch(&dir.path().join("secret.schem"));
        assert!(locator.resolve("../secret.schem").is_err());
        assert!(locator.resolve("schematics/../../secret").is_err());
        assert!(locator.resolve("").is_err());
    }

    #[test]
    fn available_lists_one_stem_per_file() {
        let (_dir, locator) = setup();
        touch(&locator.folder().join("zeta.schem"));
        touch(&locator.folder().join("alpha.schematic"));
        touch(&locator.folder().join("alpha.schem"));
        touch(&locator.folder().join("notes.txt"));
        assert_eq!(locator.available(), vec!["alpha", "alpha", "zeta"]);
    }

    #[test]
    fn available_is_empty_without_folder() {
        let dir = tempfile::tempdir().unwrap();
        let locator = SchematicLocator::new(dir.path(), "missing");
        assert!(locator.available().is_empty());
    }
}
