//! Configuration for CMap loading.

use std::path::PathBuf;

/// Environment variable naming the directory that holds predefined CMap files.
pub const CMAP_DIR_ENV: &str = "CMAPDIR";

/// Options controlling how [`CMapLoader`](crate::cmap::CMapLoader) finds and
/// chains CMaps.
///
/// # Example
///
/// ```
/// use cmap_oxide::config::LoaderOptions;
///
/// let options = LoaderOptions::new()
///     .with_cmap_dir("/usr/share/poppler/cMap/Adobe-Japan1")
///     .with_max_use_cmap_depth(4);
/// assert_eq!(options.max_use_cmap_depth, 4);
/// ```
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Directory containing predefined CMap files, one file per CMap name.
    pub cmap_dir: Option<PathBuf>,

    /// Consult [`CMAP_DIR_ENV`] when `cmap_dir` is unset.
    pub use_env: bool,

    /// Maximum length of a `usecmap` chain.
    ///
    /// Real chains are one or two levels deep; longer chains are almost
    /// certainly malformed.
    pub max_use_cmap_depth: u32,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderOptions {
    /// Create options with defaults: no explicit directory, environment
    /// lookup enabled, chains up to 16 levels deep.
    pub fn new() -> Self {
        Self {
            cmap_dir: None,
            use_env: true,
            max_use_cmap_depth: 16,
        }
    }

    /// Options with `cmap_dir` taken from [`CMAP_DIR_ENV`] right away.
    pub fn from_env() -> Self {
        let mut options = Self::new();
        options.cmap_dir = std::env::var_os(CMAP_DIR_ENV).map(PathBuf::from);
        options
    }

    /// Set the predefined CMap directory.
    pub fn with_cmap_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cmap_dir = Some(dir.into());
        self
    }

    /// Enable or disable the [`CMAP_DIR_ENV`] fallback.
    pub fn with_env(mut self, enable: bool) -> Self {
        self.use_env = enable;
        self
    }

    /// Set the maximum `usecmap` chain length.
    pub fn with_max_use_cmap_depth(mut self, depth: u32) -> Self {
        self.max_use_cmap_depth = depth;
        self
    }

    /// The directory to search: `cmap_dir`, else the environment variable
    /// when `use_env` is set.
    pub fn resolved_cmap_dir(&self) -> Option<PathBuf> {
        self.cmap_dir.clone().or_else(|| {
            if self.use_env {
                std::env::var_os(CMAP_DIR_ENV).map(PathBuf::from)
            } else {
                None
            }
        })
    }
}
