//! CMap loading, `usecmap` chaining and caching.
//!
//! Predefined CMaps are looked up by name, first in the built-in registry and
//! then through a [`ResourceLocator`]. Embedded CMaps are PDF streams fetched
//! through an [`ObjectResolver`]. Either kind may name a parent with
//! `usecmap` (or a `/UseCMap` dictionary entry); parents are loaded
//! recursively and attached before the CMap is cached.

use super::{builtin, CMap, WritingMode};
use crate::config::LoaderOptions;
use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef, ObjectResolver};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of predefined CMap programs.
pub trait ResourceLocator: Send {
    /// Raw CMap program for `name`, or [`Error::MissingResource`].
    fn locate(&self, name: &str) -> Result<Vec<u8>>;
}

/// Reads predefined CMaps from a directory, one file per CMap name.
#[derive(Debug, Clone, Default)]
pub struct DirectoryLocator {
    dir: Option<PathBuf>,
}

impl DirectoryLocator {
    /// Locator over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    /// Locator over the directory resolved from `options`, if any.
    pub fn from_options(options: &LoaderOptions) -> Self {
        Self {
            dir: options.resolved_cmap_dir(),
        }
    }

    /// The directory searched, if configured.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

/// A name that is safe to join onto a directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\', '\0']) && !name.contains("..")
}

impl ResourceLocator for DirectoryLocator {
    fn locate(&self, name: &str) -> Result<Vec<u8>> {
        let Some(dir) = &self.dir else {
            log::debug!("no CMap directory configured for '{}'", name);
            return Err(Error::MissingResource(name.to_string()));
        };
        if !is_plain_file_name(name) {
            log::warn!("refusing to load CMap with path-like name '{}'", name);
            return Err(Error::MissingResource(name.to_string()));
        }

        let path = dir.join(name);
        match std::fs::read(&path) {
            Ok(data) => {
                log::debug!("read CMap '{}' from {} ({} bytes)", name, path.display(), data.len());
                Ok(data)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::MissingResource(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

/// Loads and caches CMaps for one document.
///
/// Each distinct predefined name and each embedded stream is parsed at most
/// once per loader; repeated loads return the same `Arc`.
///
/// # Example
///
/// ```
/// use cmap_oxide::cmap::CMapLoader;
/// use cmap_oxide::config::LoaderOptions;
/// use std::sync::Arc;
///
/// let mut loader = CMapLoader::new(LoaderOptions::new().with_env(false));
/// let first = loader.load_predefined("Identity-H").unwrap();
/// let second = loader.load_predefined("Identity-H").unwrap();
/// assert!(Arc::ptr_eq(&first, &second));
/// ```
pub struct CMapLoader {
    options: LoaderOptions,
    locator: Box<dyn ResourceLocator>,
    system: HashMap<String, Arc<CMap>>,
    embedded: HashMap<ObjectRef, Arc<CMap>>,
    /// Names currently being loaded, outermost first.
    loading_names: Vec<String>,
    /// Embedded streams currently being loaded, outermost first.
    loading_refs: Vec<ObjectRef>,
}

impl std::fmt::Debug for CMapLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CMapLoader")
            .field("options", &self.options)
            .field("system", &self.system.keys().collect::<Vec<_>>())
            .field("embedded", &self.embedded.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Default for CMapLoader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

impl CMapLoader {
    /// Loader reading predefined CMaps through a [`DirectoryLocator`].
    pub fn new(options: LoaderOptions) -> Self {
        let locator = DirectoryLocator::from_options(&options);
        Self::with_locator(options, locator)
    }

    /// Loader with a custom locator.
    pub fn with_locator(options: LoaderOptions, locator: impl ResourceLocator + 'static) -> Self {
        Self {
            options,
            locator: Box::new(locator),
            system: HashMap::new(),
            embedded: HashMap::new(),
            loading_names: Vec::new(),
            loading_refs: Vec::new(),
        }
    }

    /// Options in effect.
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// True if the predefined CMap `name` is already cached.
    pub fn is_cached(&self, name: &str) -> bool {
        self.system.contains_key(name)
    }

    /// True if the embedded CMap `obj_ref` is already cached.
    pub fn is_embedded_cached(&self, obj_ref: ObjectRef) -> bool {
        self.embedded.contains_key(&obj_ref)
    }

    fn enter(&self) -> Result<()> {
        let depth = self.loading_names.len() + self.loading_refs.len();
        if depth >= self.options.max_use_cmap_depth as usize {
            log::warn!("usecmap chain exceeds {} levels", self.options.max_use_cmap_depth);
            return Err(Error::RecursionLimitExceeded(self.options.max_use_cmap_depth));
        }
        Ok(())
    }

    /// Load the predefined CMap `name` and its `usecmap` chain.
    pub fn load_predefined(&mut self, name: &str) -> Result<Arc<CMap>> {
        if let Some(cmap) = self.system.get(name) {
            log::trace!("CMap cache hit: {}", name);
            return Ok(Arc::clone(cmap));
        }
        if self.loading_names.iter().any(|n| n == name) {
            return Err(Error::CyclicUseCmap(name.to_string()));
        }
        self.enter()?;

        self.loading_names.push(name.to_string());
        let result = self.read_predefined(name);
        self.loading_names.pop();

        let cmap = Arc::new(result?);
        self.system.insert(name.to_string(), Arc::clone(&cmap));
        Ok(cmap)
    }

    fn read_predefined(&mut self, name: &str) -> Result<CMap> {
        let mut cmap = match builtin::find_builtin(name) {
            Some(table) => {
                log::debug!("using built-in CMap {}", name);
                CMap::from_static(table)
            },
            None => {
                let data = self.locator.locate(name)?;
                CMap::parse(&data)?
            },
        };

        if let Some(parent_name) = cmap.use_cmap_name().map(str::to_string) {
            log::debug!("CMap {} uses {}", name, parent_name);
            let parent = self.load_predefined(&parent_name)?;
            cmap.set_use_cmap(parent);
        }
        Ok(cmap)
    }

    /// Load the CMap stream `obj_ref` from `doc` and its parent chain.
    ///
    /// The stream dictionary's `/WMode` overrides the program's writing
    /// mode. `/UseCMap` may be a name (predefined CMap) or a reference to
    /// another embedded stream; without it, a `usecmap` in the program
    /// itself is honored.
    pub fn load_embedded<R>(&mut self, doc: &mut R, obj_ref: ObjectRef) -> Result<Arc<CMap>>
    where
        R: ObjectResolver + ?Sized,
    {
        if let Some(cmap) = self.embedded.get(&obj_ref) {
            log::trace!("embedded CMap cache hit: {}", obj_ref);
            return Ok(Arc::clone(cmap));
        }
        if self.loading_refs.contains(&obj_ref) {
            return Err(Error::CircularReference(obj_ref));
        }
        self.enter()?;

        self.loading_refs.push(obj_ref);
        let result = self.read_embedded(doc, obj_ref);
        self.loading_refs.pop();

        let cmap = Arc::new(result?);
        self.embedded.insert(obj_ref, Arc::clone(&cmap));
        Ok(cmap)
    }

    fn read_embedded<R>(&mut self, doc: &mut R, obj_ref: ObjectRef) -> Result<CMap>
    where
        R: ObjectResolver + ?Sized,
    {
        let object = doc.resolve(obj_ref)?;
        let data = object.decode_stream_data()?;
        let mut cmap = CMap::parse(&data)?;
        log::debug!("parsed embedded CMap {} '{}': {} ranges", obj_ref, cmap.name(), cmap.ranges().len());

        let Some(dict) = object.as_dict() else {
            return Ok(cmap);
        };

        if let Some(mode) = dict.get("WMode").and_then(Object::as_integer) {
            cmap = cmap.with_writing_mode(WritingMode::from_pdf(mode));
        }

        let parent = match dict.get("UseCMap") {
            Some(Object::Name(name)) => Some(self.load_predefined(name)?),
            Some(Object::Reference(parent_ref)) => Some(self.load_embedded(doc, *parent_ref)?),
            Some(other) => {
                log::warn!("ignoring /UseCMap of type {} in {}", other.type_name(), obj_ref);
                None
            },
            None => match cmap.use_cmap_name().map(str::to_string) {
                Some(name) => Some(self.load_predefined(&name)?),
                None => None,
            },
        };
        if let Some(parent) = parent {
            cmap.set_use_cmap(parent);
        }
        Ok(cmap)
    }
}
