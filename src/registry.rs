//! Declaration registry - loads sources and owns resolved declarations
//!
//! Handles:
//! - Single-source loads (`load`, `load_source`, `load_file`)
//! - Two-pass batch loads where sources may reference each other in any order
//!   (`load_all`, `load_all_sources`, `load_all_files`, `load_dir`)
//! - Duplicate and cross-namespace collision detection
//! - Lookups used by `Model::build`
//!
//! A batch load runs a lazy pass over every source first, so every name in
//! the batch is registered, then a strict pass that reloads each source with
//! full validation. Each load is all-or-nothing.

use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::config::MdfConfig;
use crate::decl::{Declaration, DeclarationKind, Enum, Model, Named, RegistryId, TypeDef};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::error::{MdfError, Result};
use crate::importer::{canonical_path, FsImporter, Importer};
use crate::parser::{parse_source, ParsedUnit};
use crate::validate::{conflict, Scope, ValidationMode, Validator};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// A registered declaration and how it got there
#[derive(Debug, Clone)]
struct Entry<T> {
    decl: T,
    /// Registered by a lazy pass and not yet confirmed by a strict one
    lazy: bool,
    /// Public load call that registered it
    batch: u64,
}

type Table<T> = IndexMap<String, Entry<T>>;

#[derive(Clone)]
struct Snapshot {
    models: Table<Model>,
    enums: Table<Enum>,
    typedefs: Table<TypeDef>,
}

/// Registry of loaded models, enums and typedefs
pub struct Registry {
    id: RegistryId,
    models: Table<Model>,
    enums: Table<Enum>,
    typedefs: Table<TypeDef>,
    /// Diagnostics of the most recent load
    errors: Vec<Diagnostic>,
    importer: Box<dyn Importer>,
    config: MdfConfig,
    batch: u64,
}

impl Registry {
    /// Create an empty registry with the default configuration
    pub fn new() -> Self {
        Self::with_config(MdfConfig::default())
    }

    /// Create an empty registry; the filesystem importer searches the
    /// configured import paths
    pub fn with_config(config: MdfConfig) -> Self {
        Self {
            id: RegistryId(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed)),
            models: IndexMap::new(),
            enums: IndexMap::new(),
            typedefs: IndexMap::new(),
            errors: Vec::new(),
            importer: Box::new(FsImporter::with_roots(config.import_paths.clone())),
            config,
            batch: 0,
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn config(&self) -> &MdfConfig {
        &self.config
    }

    /// Replace the import resolver
    pub fn set_importer(&mut self, importer: impl Importer + 'static) {
        self.importer = Box::new(importer);
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load one source with no path
    pub fn load(&mut self, text: &str) -> Result<()> {
        self.load_source(text, None)
    }

    /// Load one source. Every declaration must validate strictly against
    /// what is already registered plus the source's own declarations.
    pub fn load_source(&mut self, text: &str, path: Option<&str>) -> Result<()> {
        self.batch += 1;

        match self.load_unit(text, path, ValidationMode::Strict) {
            Ok(count) => {
                self.errors.clear();
                info!(
                    "Loaded {} declarations from {}",
                    count,
                    path.unwrap_or("<source>")
                );
                Ok(())
            }
            Err(errors) => Err(self.fail(errors)),
        }
    }

    /// Load several sources that may reference each other in any order
    pub fn load_all<S: AsRef<str>>(&mut self, texts: &[S]) -> Result<()> {
        let sources: Vec<(&str, Option<&str>)> =
            texts.iter().map(|text| (text.as_ref(), None)).collect();
        self.load_batch(&sources)
    }

    /// Like [`Registry::load_all`] with a path per source
    pub fn load_all_sources<S, P>(&mut self, sources: &[(S, Option<P>)]) -> Result<()>
    where
        S: AsRef<str>,
        P: AsRef<str>,
    {
        let sources: Vec<(&str, Option<&str>)> = sources
            .iter()
            .map(|(text, path)| (text.as_ref(), path.as_ref().map(AsRef::as_ref)))
            .collect();
        self.load_batch(&sources)
    }

    /// Load one file. Traces carry the canonical path of the file.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = read_source(path)?;
        let path = canonical_path(path);
        let path = path.to_string_lossy();
        self.load_source(&text, Some(path.as_ref()))
    }

    /// Read every file, then load them as one batch
    pub fn load_all_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        let sources = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                let text = read_source(path)?;
                Ok((text, canonical_path(path).to_string_lossy().into_owned()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.load_read_sources(&sources)
    }

    /// Load every file in `dir` with a configured extension, sorted by name.
    /// Returns the loaded paths.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let io_err = |source| MdfError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && self.config.matches_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        debug!("Found {} definition files in {:?}", paths.len(), dir);
        self.load_all_files(&paths)?;
        Ok(paths)
    }

    pub async fn load_file_async(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = read_source_async(path).await?;
        let path = canonical_path(path);
        let path = path.to_string_lossy();
        self.load_source(&text, Some(path.as_ref()))
    }

    /// Reads happen one after another; no load starts until all are read
    pub async fn load_all_files_async<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let text = read_source_async(path).await?;
            sources.push((text, canonical_path(path).to_string_lossy().into_owned()));
        }
        self.load_read_sources(&sources)
    }

    fn load_read_sources(&mut self, sources: &[(String, String)]) -> Result<()> {
        let sources: Vec<(&str, Option<&str>)> = sources
            .iter()
            .map(|(text, path)| (text.as_str(), Some(path.as_str())))
            .collect();
        self.load_batch(&sources)
    }

    /// Two-pass load. A failure in either pass restores the namespaces.
    fn load_batch(&mut self, sources: &[(&str, Option<&str>)]) -> Result<()> {
        self.batch += 1;
        let snapshot = self.snapshot();

        for mode in [ValidationMode::Lazy, ValidationMode::Strict] {
            debug!("{:?} pass over {} sources", mode, sources.len());

            for (text, path) in sources {
                if let Err(errors) = self.load_unit(text, *path, mode) {
                    self.restore(snapshot);
                    return Err(self.fail(errors));
                }
            }
        }

        self.errors.clear();
        info!(
            "Registry loaded {} sources: {} models, {} enums, {} typedefs",
            sources.len(),
            self.models.len(),
            self.enums.len(),
            self.typedefs.len()
        );
        Ok(())
    }

    /// Parse, validate and commit one source. Returns the number of
    /// declarations registered.
    fn load_unit(
        &mut self,
        text: &str,
        path: Option<&str>,
        mode: ValidationMode,
    ) -> std::result::Result<usize, Vec<Diagnostic>> {
        let unit = parse_source(text, path, Some(self.importer.as_ref()))?;

        let errors = self.validate_unit(&unit, mode);
        if !errors.is_empty() {
            return Err(errors);
        }

        let count = unit.len();
        self.commit(unit, mode);
        Ok(count)
    }

    fn validate_unit(&self, unit: &ParsedUnit, mode: ValidationMode) -> Vec<Diagnostic> {
        let mut scope = Scope::new().with_unit(unit);
        scope.extend(self.models.keys().map(String::as_str));
        scope.extend(self.enums.keys().map(String::as_str));
        scope.extend(self.typedefs.keys().map(String::as_str));

        let validator = Validator::new(&scope, mode).with_suggestions(self.config.suggestions);
        let mut errors = validator.validate_unit(unit).errors;

        if mode.is_lazy() {
            return errors;
        }

        let registered = |kind: DeclarationKind, name: &str| -> bool {
            match kind {
                DeclarationKind::Model => is_strict(&self.models, name),
                DeclarationKind::Enum => is_strict(&self.enums, name),
                DeclarationKind::TypeDef => is_strict(&self.typedefs, name),
            }
        };

        let decls = unit
            .enums
            .values()
            .map(|e| e as &dyn Named)
            .chain(unit.typedefs.values().map(|t| t as &dyn Named))
            .chain(unit.models.values().map(|m| m as &dyn Named));

        for decl in decls {
            if let Some(error) = self.check_duplicate(decl) {
                errors.push(error);
            }
            for other in [
                DeclarationKind::Model,
                DeclarationKind::Enum,
                DeclarationKind::TypeDef,
            ] {
                if other != decl.kind() && registered(other, decl.name()) {
                    errors.push(conflict(decl, other.as_str()));
                }
            }
        }

        errors
    }

    /// A strictly registered entry of the same name is a duplicate, unless it
    /// is the very same declaration of the same file registered earlier in
    /// this batch. A file may reach a batch more than once, as an import or
    /// as one of the batch sources, in any order.
    fn check_duplicate(&self, decl: &dyn Named) -> Option<Diagnostic> {
        let (lazy, batch, trace) = match decl.kind() {
            DeclarationKind::Model => entry_meta(&self.models, decl.name())?,
            DeclarationKind::Enum => entry_meta(&self.enums, decl.name())?,
            DeclarationKind::TypeDef => entry_meta(&self.typedefs, decl.name())?,
        };

        if lazy {
            return None;
        }

        let same_file = decl.trace().path().is_some() && trace == decl.trace();
        if same_file && batch == self.batch {
            return None;
        }

        Some(Diagnostic::at(
            DiagnosticCode::DuplicateDeclaration,
            format!("Duplicate {} `{}`", decl.kind(), decl.name()),
            decl.trace(),
        ))
    }

    fn commit(&mut self, unit: ParsedUnit, mode: ValidationMode) {
        let lazy = mode.is_lazy();
        let batch = self.batch;

        for (name, enumeration) in unit.enums {
            register(&mut self.enums, name, enumeration, lazy, batch);
        }
        for (name, typedef) in unit.typedefs {
            register(&mut self.typedefs, name, typedef, lazy, batch);
        }
        for (name, mut model) in unit.models {
            model.bind(self.id);
            register(&mut self.models, name, model, lazy, batch);
        }
    }

    fn fail(&mut self, errors: Vec<Diagnostic>) -> MdfError {
        warn!("Load failed with {} error(s)", errors.len());
        self.errors = errors.clone();
        MdfError::Load(errors)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            models: self.models.clone(),
            enums: self.enums.clone(),
            typedefs: self.typedefs.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        self.models = snapshot.models;
        self.enums = snapshot.enums;
        self.typedefs = snapshot.typedefs;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Diagnostics of the most recent load; empty after a successful one
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values().map(|e| &e.decl)
    }

    pub fn enums(&self) -> impl Iterator<Item = &Enum> {
        self.enums.values().map(|e| &e.decl)
    }

    pub fn typedefs(&self) -> impl Iterator<Item = &TypeDef> {
        self.typedefs.values().map(|e| &e.decl)
    }

    pub fn model(&self, name: &str) -> Option<&Model> {
        self.models.get(name).map(|e| &e.decl)
    }

    pub fn enum_def(&self, name: &str) -> Option<&Enum> {
        self.enums.get(name).map(|e| &e.decl)
    }

    pub fn typedef(&self, name: &str) -> Option<&TypeDef> {
        self.typedefs.get(name).map(|e| &e.decl)
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn has_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub fn has_typedef(&self, name: &str) -> bool {
        self.typedefs.contains_key(name)
    }

    /// Look a name up across namespaces: models, then enums, then typedefs
    pub fn declaration(&self, name: &str) -> Option<Declaration<'_>> {
        self.model(name)
            .map(Declaration::Model)
            .or_else(|| self.enum_def(name).map(Declaration::Enum))
            .or_else(|| self.typedef(name).map(Declaration::TypeDef))
    }

    /// Every declaration, grouped by namespace
    pub fn declarations(&self) -> impl Iterator<Item = Declaration<'_>> {
        self.models()
            .map(Declaration::Model)
            .chain(self.enums().map(Declaration::Enum))
            .chain(self.typedefs().map(Declaration::TypeDef))
    }

    pub fn len(&self) -> usize {
        self.models.len() + self.enums.len() + self.typedefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("enums", &self.enums.keys().collect::<Vec<_>>())
            .field("typedefs", &self.typedefs.keys().collect::<Vec<_>>())
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}

/// Insert an entry. A lazy pass never replaces a strict entry.
fn register<T>(table: &mut Table<T>, name: String, decl: T, lazy: bool, batch: u64) {
    if lazy && table.get(&name).is_some_and(|e| !e.lazy) {
        return;
    }
    table.insert(name, Entry { decl, lazy, batch });
}

fn is_strict<T>(table: &Table<T>, name: &str) -> bool {
    table.get(name).is_some_and(|e| !e.lazy)
}

fn entry_meta<'t, T: Named>(
    table: &'t Table<T>,
    name: &str,
) -> Option<(bool, u64, &'t crate::trace::Trace)> {
    table
        .get(name)
        .map(|e| (e.lazy, e.batch, e.decl.trace()))
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| MdfError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn read_source_async(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| MdfError::Io {
            path: path.to_path_buf(),
            source,
        })
}
