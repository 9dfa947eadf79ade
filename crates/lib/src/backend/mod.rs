//! Format backends for configuration documents.
//!
//! A [`Backend`] is a pluggable codec that loads a whole document into a
//! tree [`Value`] and saves one back. The core is independent of the
//! concrete on-disk format; backends are registered in a process-wide
//! ordered list, and a source picks its backend by matching the file
//! extension against each backend's [`Backend::name`] tag. When the
//! extension is missing or unknown, the first-registered backend wins and
//! its tag is appended to the file name.
//!
//! The registry lives on the event-loop thread, like every other piece of
//! process-wide state in this crate.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::value::Value;

mod errors;
pub mod json;

pub use errors::BackendError;
pub use json::JsonBackend;

/// Format codec for configuration documents.
///
/// Implementations must round-trip maps, lists, and whatever subset of the
/// scalar space the format can represent; the scalar pinning is the
/// backend's to document. `load` should prefer returning [`Value::Null`]
/// for a missing file and an error for a malformed one — the caller decides
/// whether absence is acceptable.
pub trait Backend {
    /// Lowercase file-extension tag identifying this backend, e.g. `"json"`.
    fn name(&self) -> &'static str;

    /// Loads the document at `path` into a tree value.
    fn load(&self, path: &Path) -> Result<Value, BackendError>;

    /// Saves a tree value as the whole document at `path`. Atomic
    /// write-temp-then-rename is preferred but not required.
    fn save(&self, path: &Path, value: &Value) -> Result<(), BackendError>;
}

thread_local! {
    static REGISTRY: RefCell<Vec<Rc<dyn Backend>>> = const { RefCell::new(Vec::new()) };
}

/// Appends a backend to the process-wide registry. Registration order is
/// significant: the first-registered backend is the default when extension
/// inference fails.
pub fn register(backend: Rc<dyn Backend>) {
    REGISTRY.with(|registry| registry.borrow_mut().push(backend));
}

/// Looks up a backend by its extension tag.
pub fn find(name: &str) -> Option<Rc<dyn Backend>> {
    REGISTRY.with(|registry| {
        registry
            .borrow()
            .iter()
            .find(|backend| backend.name() == name)
            .cloned()
    })
}

/// The first-registered backend, or [`BackendError::NoBackends`] when the
/// registry is empty.
pub fn default_backend() -> Result<Rc<dyn Backend>, BackendError> {
    REGISTRY.with(|registry| {
        registry
            .borrow()
            .first()
            .cloned()
            .ok_or(BackendError::NoBackends)
    })
}
