//! Per-user file locations, following the XDG base directory layout.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Directory created under each base directory.
const APP_DIR: &str = "cinesched";

/// Which base directory a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseDir {
    /// `config.toml`, under `$XDG_CONFIG_HOME` (`~/.config`).
    Config,
    /// `schedule.json`, under `$XDG_DATA_HOME` (`~/.local/share`).
    Data,
}

impl BaseDir {
    /// File kept in this base directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Config => "config.toml",
            Self::Data => "schedule.json",
        }
    }

    const fn env_var(self) -> &'static str {
        match self {
            Self::Config => "XDG_CONFIG_HOME",
            Self::Data => "XDG_DATA_HOME",
        }
    }

    const fn home_default(self) -> &'static [&'static str] {
        match self {
            Self::Config => &[".config"],
            Self::Data => &[".local", "share"],
        }
    }
}

/// Resolves the path of `base`'s file.
///
/// - With `dir`, both files live directly in it.
/// - Otherwise `$XDG_CONFIG_HOME`/`$XDG_DATA_HOME` when set to an absolute
///   path, else the XDG default under `$HOME`.
///
/// # Errors
///
/// Returns an error if neither `dir`, the XDG variable nor `HOME` is usable.
pub fn resolve_path(base: BaseDir, dir: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_with(base, dir, |key| std::env::var_os(key))
}

fn resolve_with(
    base: BaseDir,
    dir: Option<&PathBuf>,
    env: impl Fn(&str) -> Option<OsString>,
) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join(base.file_name()));
    }

    // Relative XDG values are invalid and must be ignored.
    let xdg = env(base.env_var())
        .map(PathBuf::from)
        .filter(|p| p.is_absolute());
    let root = match xdg {
        Some(root) => root,
        None => {
            let home = env("HOME")
                .filter(|h| !h.is_empty())
                .context("HOME environment variable is not set")?;
            base.home_default()
                .iter()
                .fold(PathBuf::from(home), |path, part| path.join(part))
        }
    };

    Ok(root.join(APP_DIR).join(base.file_name()))
}
