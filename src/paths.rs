//! XDG-compliant path resolution for switch-topo.
//!
//! Provides `TopoPaths`: where the configuration file and the link-graph
//! database live unless the command line says otherwise.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Directory name under the XDG base directories.
pub const APP_DIR: &str = "switch-topo";

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(topo::paths::no_home),
        help("Set the HOME environment variable, or pass --db and --config explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(topo::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Global XDG-compliant directories for switch-topo.
#[derive(Debug, Clone)]
pub struct TopoPaths {
    /// `$XDG_CONFIG_HOME/switch-topo/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/switch-topo/`
    pub data_dir: PathBuf,
}

impl TopoPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join(APP_DIR);

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Create both directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// `config_dir/config.toml`
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// `data_dir/topo.redb`
    pub fn database_file(&self) -> PathBuf {
        self.data_dir.join("topo.redb")
    }
}
