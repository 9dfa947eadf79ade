//! Backing documents for layered configuration.
//!
//! A [`Source`] is one backing document: its file name, the backend that
//! decodes it, the loaded root node, a dirty bit, and the modification
//! stamp recorded at load. Sources are shared between every cursor layered
//! over the same document and are cached process-wide by canonical name
//! (see [`cache`]); a source whose on-disk document changed since load is
//! considered stale and reloaded on the next open.
//!
//! Dirty sources are normally flushed by the coalescing saver; a source
//! dropped while still dirty flushes synchronously as a last chance.

use std::cell::Cell;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use crate::backend::{self, Backend};
use crate::node::{Node, NodeRef, NodeType};
use crate::value::Value;
use crate::Result;

mod cache;

pub(crate) use cache::{insert as cache_insert, lookup as cache_lookup};

/// One backing configuration document.
pub struct Source {
    file_name: PathBuf,
    backend: Rc<dyn Backend>,
    data: NodeRef,
    dirty: Cell<bool>,
    queued: Cell<bool>,
    last_modified: Cell<Option<SystemTime>>,
}

impl Source {
    /// Opens (or creates) the document at `path`.
    ///
    /// Relative paths resolve against the user configuration directory, or
    /// the system directory when `system_dir` is set; an absolute path
    /// combined with `system_dir` never opens (it is already reachable via
    /// the user-path code path). An empty path stands for `"profile"`.
    ///
    /// Returns `None` when the document does not exist and `create` is
    /// false, when its root is not a map (and `create` is false), or when
    /// no backend can be determined. Reasons are logged.
    pub fn open(
        path: impl AsRef<Path>,
        system_dir: bool,
        create: bool,
        backend: Option<Rc<dyn Backend>>,
    ) -> Option<Rc<Source>> {
        let path = path.as_ref();
        let mut file_name = if path.as_os_str().is_empty() {
            PathBuf::from("profile")
        } else {
            path.to_path_buf()
        };

        if file_name.is_relative() {
            match crate::resolver::resolve(&file_name, system_dir) {
                Some(resolved) => file_name = resolved,
                None => {
                    tracing::warn!(path = %file_name.display(), "no directory resolver installed");
                    return None;
                }
            }
        } else if system_dir {
            // An absolute path must open only once, via the user-dir pass.
            return None;
        }
        let mut file_name = clean_path(&file_name);

        if let Some(source) = cache_lookup(&file_name) {
            if source.is_valid() {
                tracing::debug!(path = %file_name.display(), "configuration cache hit");
                return Some(source);
            }
        }

        let backend = match backend {
            Some(backend) => backend,
            None => {
                let by_extension = file_name
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_lowercase())
                    .and_then(|ext| backend::find(&ext));

                match by_extension {
                    Some(backend) => backend,
                    None => {
                        let backend = match backend::default_backend() {
                            Ok(backend) => backend,
                            Err(err) => {
                                tracing::warn!(error = %err, path = %file_name.display(),
                                    "cannot open configuration source");
                                return None;
                            }
                        };

                        let mut renamed = file_name.into_os_string();
                        renamed.push(".");
                        renamed.push(backend.name());
                        file_name = PathBuf::from(renamed);

                        if let Some(source) = cache_lookup(&file_name) {
                            if source.is_valid() {
                                return Some(source);
                            }
                        }
                        backend
                    }
                }
            }
        };

        let metadata = fs::metadata(&file_name).ok();
        let exists = metadata.is_some();
        if !exists && !create {
            tracing::debug!(path = %file_name.display(), "configuration file does not exist");
            return None;
        }

        if let Some(parent) = file_name.parent() {
            if !parent.as_os_str().is_empty() && fs::metadata(parent).is_err() {
                if !create {
                    return None;
                }
                if let Err(err) = fs::create_dir_all(parent) {
                    tracing::warn!(path = %parent.display(), error = %err,
                        "cannot create configuration directory");
                    return None;
                }
            }
        }

        let writable = metadata
            .as_ref()
            .map(|meta| !meta.permissions().readonly())
            .unwrap_or(false);
        let read_only = (exists && !writable) || system_dir;
        let last_modified = metadata.and_then(|meta| meta.modified().ok());

        let value = match backend.load(&file_name) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(path = %file_name.display(), error = %err,
                    "failed to load configuration document");
                Value::Null
            }
        };

        let mut data = Node::from_value(&value, read_only);
        if matches!(data.node_type(), NodeType::Scalar | NodeType::Null) {
            if !create {
                tracing::debug!(path = %file_name.display(),
                    "configuration document root is not a map");
                return None;
            }
            data = Node::from_value(&Value::Map(Default::default()), read_only);
        }

        let source = Rc::new(Source {
            file_name: file_name.clone(),
            backend,
            data,
            dirty: Cell::new(false),
            queued: Cell::new(false),
            last_modified: Cell::new(last_modified),
        });
        cache_insert(file_name, source.clone());
        Some(source)
    }

    /// Canonical file name of the backing document.
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// The loaded root node.
    pub fn data(&self) -> NodeRef {
        self.data.clone()
    }

    /// The backend decoding this document.
    pub fn backend(&self) -> Rc<dyn Backend> {
        self.backend.clone()
    }

    /// Modification stamp recorded at load or last save.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified.get()
    }

    /// True while the file's current modification time matches the stamp
    /// recorded at load, i.e. nobody rewrote the document underneath us.
    pub fn is_valid(&self) -> bool {
        let on_disk = fs::metadata(&self.file_name)
            .and_then(|meta| meta.modified())
            .ok();
        on_disk == self.last_modified.get()
    }

    /// Marks the in-memory tree as diverged from the saved document.
    pub fn make_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn mark_queued(&self) {
        self.queued.set(true);
    }

    pub(crate) fn clear_queued(&self) {
        self.queued.set(false);
    }

    pub(crate) fn is_queued(&self) -> bool {
        self.queued.get()
    }

    /// Serializes the root tree through the backend right now, clearing the
    /// dirty bit and refreshing the modification stamp on success.
    pub fn sync(&self) -> Result<()> {
        self.backend.save(&self.file_name, &self.data.to_value())?;
        self.dirty.set(false);
        self.update_stamp();
        Ok(())
    }

    fn update_stamp(&self) {
        let stamp = fs::metadata(&self.file_name)
            .and_then(|meta| meta.modified())
            .ok();
        self.last_modified.set(stamp);
    }
}

impl Drop for Source {
    fn drop(&mut self) {
        // Last-chance flush; the queued save event (if any) becomes a no-op.
        if self.dirty.get() {
            if let Err(err) = self.sync() {
                tracing::error!(path = %self.file_name.display(), error = %err,
                    "failed to flush configuration document");
            }
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("file_name", &self.file_name)
            .field("backend", &self.backend.name())
            .field("dirty", &self.dirty.get())
            .field("queued", &self.queued.get())
            .finish()
    }
}

/// Lexically normalizes a path: strips `.` components and folds `..` into
/// the preceding normal component. No filesystem access, so unsaved paths
/// normalize the same way as existing ones.
fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
