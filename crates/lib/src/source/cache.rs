//! Recently-used cache of open sources.
//!
//! Sources are cached by canonical file name so that every cursor over the
//! same document shares one loaded tree. Each lookup or insert refreshes
//! the entry's idle stamp; entries idle past the expiry window are evicted
//! during the next cache access. Eviction only drops the cache's own
//! reference — a source stays alive as long as any cursor still holds it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use super::Source;

/// Idle window after which an unused cache entry is dropped.
const IDLE_EXPIRY: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    source: Rc<Source>,
    last_access: Instant,
}

thread_local! {
    static CACHE: RefCell<HashMap<PathBuf, CacheEntry>> = RefCell::new(HashMap::new());
}

fn sweep(entries: &mut HashMap<PathBuf, CacheEntry>, now: Instant) {
    entries.retain(|_, entry| now.duration_since(entry.last_access) < IDLE_EXPIRY);
}

pub(crate) fn lookup(path: &Path) -> Option<Rc<Source>> {
    CACHE.with(|cache| {
        let mut entries = cache.borrow_mut();
        let now = Instant::now();
        sweep(&mut entries, now);

        entries.get_mut(path).map(|entry| {
            entry.last_access = now;
            entry.source.clone()
        })
    })
}

pub(crate) fn insert(path: PathBuf, source: Rc<Source>) {
    CACHE.with(|cache| {
        let mut entries = cache.borrow_mut();
        let now = Instant::now();
        sweep(&mut entries, now);

        entries.insert(
            path,
            CacheEntry {
                source,
                last_access: now,
            },
        );
    })
}
