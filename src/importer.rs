//! Import resolution
//!
//! The parser never touches storage itself. When it meets `import "path"` it
//! asks an [`Importer`] for the text of that source. The registry installs a
//! [`FsImporter`] by default; hosts can swap in anything that implements the
//! trait, including a plain closure.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Source text returned by an importer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSource {
    /// Identity of the imported source, used for traces and cycle detection
    pub path: String,
    pub text: String,
}

impl ImportedSource {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// Canonical form of `path`, or the path unchanged when it cannot be
/// canonicalized (missing file, permissions)
pub fn canonical_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Resolves `import` directives to source text
pub trait Importer {
    /// `current` is the path of the importing source, if it has one.
    /// Returns `None` when the import cannot be found.
    fn resolve(&self, current: Option<&str>, import: &str) -> Option<ImportedSource>;
}

/// Closures act as importers; the import string doubles as the source path
impl<F> Importer for F
where
    F: Fn(Option<&str>, &str) -> Option<String>,
{
    fn resolve(&self, current: Option<&str>, import: &str) -> Option<ImportedSource> {
        self(current, import).map(|text| ImportedSource::new(import, text))
    }
}

/// Filesystem importer
///
/// Resolution order:
/// 1. relative to the directory of the importing file
/// 2. the import path as given (absolute, or relative to the working directory)
/// 3. each configured import root
///
/// Resolved paths are canonical, so one file has one identity no matter how
/// an import spells it.
#[derive(Debug, Clone, Default)]
pub struct FsImporter {
    roots: Vec<PathBuf>,
}

impl FsImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates(&self, current: Option<&str>, import: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(dir) = current.and_then(|c| Path::new(c).parent()) {
            candidates.push(dir.join(import));
        }
        candidates.push(PathBuf::from(import));
        for root in &self.roots {
            candidates.push(root.join(import));
        }

        candidates
    }
}

impl Importer for FsImporter {
    fn resolve(&self, current: Option<&str>, import: &str) -> Option<ImportedSource> {
        for candidate in self.candidates(current, import) {
            if !candidate.is_file() {
                continue;
            }
            match std::fs::read_to_string(&candidate) {
                Ok(text) => {
                    debug!("Resolved import {:?} to {:?}", import, candidate);
                    let path = canonical_path(&candidate);
                    return Some(ImportedSource::new(path.to_string_lossy().into_owned(), text));
                }
                Err(e) => {
                    debug!("Failed to read import candidate {:?}: {}", candidate, e);
                    return None;
                }
            }
        }

        debug!("Import {:?} not found (from {:?})", import, current);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_closure_importer() {
        let importer = |_: Option<&str>, import: &str| {
            (import == "types.mdl").then(|| "enum Role { A }".to_string())
        };
        let found = importer.resolve(None, "types.mdl").unwrap();
        assert_eq!(found.path, "types.mdl");
        assert_eq!(found.text, "enum Role { A }");
        assert!(importer.resolve(None, "other.mdl").is_none());
    }

    #[test]
    fn test_fs_importer_relative_to_current() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("shared.mdl"), "enum Flag { On, Off }").unwrap();
        let current = dir.path().join("main.mdl");

        let importer = FsImporter::new();
        let found = importer
            .resolve(Some(current.to_str().unwrap()), "shared.mdl")
            .unwrap();
        assert_eq!(found.text, "enum Flag { On, Off }");
        assert!(found.path.ends_with("shared.mdl"));
    }

    #[test]
    fn test_fs_importer_roots() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib").join("base.mdl"), "typedef Id integer;").unwrap();

        let importer = FsImporter::with_roots(vec![dir.path().join("lib")]);
        let found = importer.resolve(None, "base.mdl").unwrap();
        assert_eq!(found.text, "typedef Id integer;");
    }

    #[test]
    fn test_fs_importer_returns_canonical_path() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d").join("b.mdl"), "model B { integer id; }").unwrap();
        let current = dir.path().join("d").join("a.mdl");

        let importer = FsImporter::new();
        let dotted = importer
            .resolve(Some(current.to_str().unwrap()), "./b.mdl")
            .unwrap();
        let parent = importer
            .resolve(Some(current.to_str().unwrap()), "../d/b.mdl")
            .unwrap();

        let expected = fs::canonicalize(dir.path().join("d").join("b.mdl")).unwrap();
        assert_eq!(dotted.path, expected.to_string_lossy());
        assert_eq!(parent.path, dotted.path);
    }

    #[test]
    fn test_canonical_path_falls_back_when_missing() {
        let missing = Path::new("/nonexistent/dir/a.mdl");
        assert_eq!(canonical_path(missing), missing.to_path_buf());
    }

    #[test]
    fn test_fs_importer_not_found() {
        let importer = FsImporter::new();
        assert!(importer
            .resolve(Some("/nonexistent/dir/a.mdl"), "missing-file.mdl")
            .is_none());
    }
}
