//!
//! Strata: a layered hierarchical configuration store.
//! This library merges several backing documents into a single logical view
//! and defers persistence through a coalescing save path.
//!
//! ## Core Concepts
//!
//! * **Values (`value::Value`)**: The tree-shaped interchange form — maps,
//!   lists, and a small scalar space — exchanged between the core, format
//!   backends, and application code.
//! * **Nodes (`node::Node`)**: Reference-counted cells of a loaded tree,
//!   each carrying a read-only flag fixed at construction.
//! * **Sources (`source::Source`)**: One backing document each: file name,
//!   backend, root node, dirty bit, and modification stamp. Open sources
//!   are cached process-wide with an idle expiry.
//! * **Backends (`backend::Backend`)**: Pluggable format codecs registered
//!   in an ordered list; the file extension picks the codec, the first
//!   registration is the default. A JSON backend ships in the box.
//! * **Cursors (`config::Config`)**: The user-facing handle: group and
//!   array navigation over layered documents, first-layer-wins reads,
//!   writes through the single writable layer, and derived cursors that
//!   share nodes with their parent.
//! * **Saver (`saver`)**: Coalesces save requests and hands them to the
//!   host event loop; one dirty source never schedules two writes.
//!
//! The whole store runs on one event-loop thread: no locks, non-atomic
//! reference counting, and process-wide state held in thread-locals. The
//! host drives deferred saves by calling [`saver::dispatch_pending`] once
//! per loop turn and [`saver::flush_all`] at shutdown.

pub mod backend;
pub mod config;
pub mod crypto;
mod level;
pub mod node;
pub mod resolver;
pub mod saver;
pub mod source;
pub mod value;

pub use config::{Config, ValueFlags};
pub use source::Source;
pub use value::Value;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the library.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Structured errors from format backends
    #[error(transparent)]
    Backend(#[from] backend::BackendError),
}

impl Error {
    /// Check if this error originated in a format backend.
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Error::Backend(_))
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        match self {
            Error::Io(_) => true,
            Error::Backend(backend_err) => backend_err.is_io_error(),
        }
    }

    /// Check if this error is a parse/serialize failure rather than I/O.
    pub fn is_format_error(&self) -> bool {
        match self {
            Error::Backend(backend_err) => backend_err.is_format_error(),
            _ => false,
        }
    }
}
