//! Coalesced deferred saves.
//!
//! Cursor syncs do not write to disk directly: they post the dirty source
//! here, and the host's event loop drains the queue by calling
//! [`dispatch_pending`] once per turn — after its higher-priority work, so
//! pending UI and protocol events drain first. Each source carries a
//! "queued" bit that suppresses duplicate posts while one is in flight;
//! that bit is the whole coalescing mechanism.
//!
//! The queue holds weak references. A source dropped while queued has
//! already flushed itself in its destructor, and its stale queue entry
//! dispatches as a no-op. [`flush_all`] is the shutdown hook: it loops
//! until nothing is pending so no dirty source outlives the process.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::source::Source;

thread_local! {
    static QUEUE: RefCell<VecDeque<Weak<Source>>> = const { RefCell::new(VecDeque::new()) };
}

/// Enqueues a save for `source`. The caller has already checked and set
/// the queued bit, so one source never occupies two slots.
pub(crate) fn post(source: &Rc<Source>) {
    QUEUE.with(|queue| queue.borrow_mut().push_back(Rc::downgrade(source)));
}

/// True while saves are waiting for dispatch.
pub fn has_pending() -> bool {
    QUEUE.with(|queue| !queue.borrow().is_empty())
}

/// Dispatches every save posted before this call, in FIFO order, and
/// returns how many documents were written. Saves posted during dispatch
/// wait for the next turn. Failed saves are logged and swallowed; the
/// source stays dirty and re-queues on its next sync.
pub fn dispatch_pending() -> usize {
    let batch: Vec<Weak<Source>> =
        QUEUE.with(|queue| queue.borrow_mut().drain(..).collect());

    let mut saved = 0;
    for entry in batch {
        let Some(source) = entry.upgrade() else {
            // Dropped while queued; its destructor already flushed.
            continue;
        };

        source.clear_queued();
        if !source.is_dirty() {
            continue;
        }

        match source.sync() {
            Ok(()) => saved += 1,
            Err(err) => {
                tracing::error!(path = %source.file_name().display(), error = %err,
                    "background configuration save failed");
            }
        }
    }
    saved
}

/// Shutdown hook: drains the queue to completion, including saves posted
/// by the drain itself.
pub fn flush_all() {
    while has_pending() {
        dispatch_pending();
    }
}
