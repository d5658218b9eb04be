//! XDG-compliant path resolution.
//!
//! Trained classifiers are read first from the user-writable data directory,
//! then from an optional packaged system directory (`OMR_SYSTEM_DIR`).
//! Training always writes back to the user location.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(omr::paths::no_home),
        help("Set the HOME environment variable or ensure a valid user profile exists.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(omr::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// File name of the persisted glyph network, relative to an `eval/` directory.
pub const NETWORK_FILE_NAME: &str = "glyph-network.json";

/// Global directories used by the recognition core.
#[derive(Debug, Clone)]
pub struct OmrPaths {
    /// `$XDG_CONFIG_HOME/omr/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/omr/`
    pub data_dir: PathBuf,
    /// `$XDG_CACHE_HOME/omr/`
    pub cache_dir: PathBuf,
    /// Packaged read-only resources, if installed.
    pub system_dir: Option<PathBuf>,
}

impl OmrPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("omr");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("omr");

        let cache_dir = std::env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".cache"))
            .join("omr");

        let system_dir = std::env::var("OMR_SYSTEM_DIR").ok().map(PathBuf::from);

        Ok(Self {
            config_dir,
            data_dir,
            cache_dir,
            system_dir,
        })
    }

    /// Lay out every directory under a single root. Used by tests and by
    /// callers that keep all state in one place.
    pub fn rooted(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            system_dir: None,
        }
    }

    /// Attach a packaged resource directory.
    pub fn with_system_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.system_dir = Some(dir.into());
        self
    }

    /// Create all writable directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [
            &self.config_dir,
            &self.data_dir,
            &self.cache_dir,
            &self.data_dir.join("eval"),
        ] {
            create_dir(dir)?;
        }
        Ok(())
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// User-writable location of the trained glyph network.
    pub fn user_network_file(&self) -> PathBuf {
        self.data_dir.join("eval").join(NETWORK_FILE_NAME)
    }

    /// Packaged default glyph network, if a system directory is known.
    pub fn default_network_file(&self) -> Option<PathBuf> {
        self.system_dir
            .as_ref()
            .map(|dir| dir.join("eval").join(NETWORK_FILE_NAME))
    }

    /// Candidate network files in lookup order: user first, then packaged.
    pub fn network_candidates(&self) -> Vec<PathBuf> {
        std::iter::once(self.user_network_file())
            .chain(self.default_network_file())
            .collect()
    }
}

/// Create a directory (and its parents), mapping the failure to [`PathError`].
pub fn create_dir(dir: &Path) -> PathResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
        path: dir.display().to_string(),
        source: e,
    })
}
