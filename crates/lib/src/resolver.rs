//! Resolution of relative configuration names to absolute paths.
//!
//! The store itself has no opinion about where configuration lives; the
//! embedding application installs a [`DirResolver`] mapping the two roots —
//! the writable user configuration directory and the typically read-only
//! system configuration directory. A relative document name resolves to
//! `root / name`. Until a resolver is installed, relative opens yield no
//! source.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Supplies the two configuration roots.
pub trait DirResolver {
    /// The writable per-user configuration directory.
    fn user_config_dir(&self) -> PathBuf;

    /// The system-wide configuration directory.
    fn system_config_dir(&self) -> PathBuf;
}

/// A resolver over two fixed directories.
#[derive(Debug, Clone)]
pub struct StaticDirs {
    user: PathBuf,
    system: PathBuf,
}

impl StaticDirs {
    pub fn new(user: impl Into<PathBuf>, system: impl Into<PathBuf>) -> Self {
        StaticDirs {
            user: user.into(),
            system: system.into(),
        }
    }
}

impl DirResolver for StaticDirs {
    fn user_config_dir(&self) -> PathBuf {
        self.user.clone()
    }

    fn system_config_dir(&self) -> PathBuf {
        self.system.clone()
    }
}

thread_local! {
    static RESOLVER: RefCell<Option<Rc<dyn DirResolver>>> = const { RefCell::new(None) };
}

/// Installs the process-wide resolver, replacing any previous one.
pub fn install(resolver: Rc<dyn DirResolver>) {
    RESOLVER.with(|cell| *cell.borrow_mut() = Some(resolver));
}

/// Resolves a relative name against the requested root. `None` when no
/// resolver is installed.
pub(crate) fn resolve(name: &Path, system_dir: bool) -> Option<PathBuf> {
    RESOLVER.with(|cell| {
        let resolver = cell.borrow();
        let resolver = resolver.as_ref()?;
        let root = if system_dir {
            resolver.system_config_dir()
        } else {
            resolver.user_config_dir()
        };
        Some(root.join(name))
    })
}
