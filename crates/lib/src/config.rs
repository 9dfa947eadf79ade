//! Layered configuration cursors.
//!
//! A [`Config`] is the user-facing handle over one logical configuration:
//! a stack of navigation [`Level`]s (the top frame is current) plus the
//! ordered list of backing [`Source`]s. Reads walk the current frame's
//! layers in order and the first present, non-null value wins; writes go
//! through the first atom only — the single writable layer — and dirty its
//! source only when the stored value really changed.
//!
//! Cursors produced by [`Config::group`] and [`Config::array_element`]
//! share the underlying nodes with their parent and hold a memory-guard
//! reference to it: the guard keeps the parent's sources (and therefore
//! the writable nodes the child mutates) alive, and marks the child as
//! derived so that only the original cursor schedules a save when dropped.
//!
//! ```
//! use strata::{Config, Value};
//!
//! let cfg = Config::from_value(&Value::Map(Default::default()));
//! cfg.set_value("general/name", "alice");
//! assert!(cfg.value("general/name", "") == "alice");
//!
//! let general = cfg.group("general");
//! general.set_value("volume", 11);
//! assert!(cfg.value("general/volume", 0) == 11);
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backend::Backend;
use crate::crypto;
use crate::level::Level;
use crate::node::{Node, NodeRef, NodeType};
use crate::saver;
use crate::source::Source;
use crate::value::Value;

/// Options recognized by value reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueFlags {
    /// Store and return the value as-is
    #[default]
    Normal,
    /// Pass the value through the installed crypto service on both paths
    Crypted,
}

#[derive(Debug)]
struct ConfigInner {
    levels: RefCell<Vec<Level>>,
    sources: Vec<Rc<Source>>,
    /// Keeps the parent cursor (and its sources) alive for derived
    /// cursors, and suppresses their implicit sync on drop.
    memory_guard: Option<Rc<ConfigInner>>,
}

impl ConfigInner {
    fn current(&self) -> Level {
        self.levels.borrow().last().cloned().unwrap_or_default()
    }

    /// Posts a save event for every dirty source that is not already
    /// queued. The queued bit coalesces bursts of mutations into one save.
    fn request_save(&self) {
        for source in &self.sources {
            if source.is_dirty() && !source.is_queued() {
                source.mark_queued();
                saver::post(source);
            }
        }
    }
}

impl Drop for ConfigInner {
    fn drop(&mut self) {
        // Only the original cursor schedules saves; derived cursors leave
        // that to the parent their guard keeps alive.
        if self.memory_guard.is_none() {
            self.request_save();
        }
    }
}

/// Cursor over a layered configuration.
///
/// Cloning a `Config` yields a second handle to the same cursor state, as
/// with any shared handle. Independent navigation over the same documents
/// wants [`Config::group`] or a fresh [`Config::open`] instead.
#[derive(Debug, Clone)]
pub struct Config {
    d: Rc<ConfigInner>,
}

impl Config {
    /// Opens a layered configuration over a single document name.
    ///
    /// The name is opened against the user configuration directory first
    /// and the system directory second; the user document is created on
    /// demand and becomes the writable layer, while the system document
    /// (when present) layers underneath as read-only defaults.
    pub fn open(path: impl AsRef<Path>) -> Config {
        Config::build(&[path], Vec::new(), None)
    }

    /// Opens a layered configuration over several document names, in
    /// decreasing precedence.
    pub fn open_many<P: AsRef<Path>>(paths: &[P]) -> Config {
        Config::build(paths, Vec::new(), None)
    }

    /// [`Config::open`] with an explicit backend instead of extension
    /// inference.
    pub fn open_with_backend(path: impl AsRef<Path>, backend: Rc<dyn Backend>) -> Config {
        Config::build(&[path], Vec::new(), Some(backend))
    }

    /// [`Config::open_many`] with in-memory fallback trees appended after
    /// all file layers. Fallbacks are read-only; a fallback whose root is
    /// not a map or list is discarded.
    pub fn open_with_fallbacks<P: AsRef<Path>>(paths: &[P], fallbacks: Vec<Value>) -> Config {
        Config::build(paths, fallbacks, None)
    }

    /// A purely in-memory cursor over one writable tree. Nothing is ever
    /// persisted; useful for tests and for code that wants the navigation
    /// API over transient data. A root that is not a map or list is
    /// discarded in favor of an empty writable map.
    pub fn from_value(value: &Value) -> Config {
        let mut root = Node::from_value(value, false);
        if !root.is_map() && !root.is_list() {
            root = Node::from_value(&Value::Map(Default::default()), false);
        }

        Config {
            d: Rc::new(ConfigInner {
                levels: RefCell::new(vec![Level::with_atoms(vec![root])]),
                sources: Vec::new(),
                memory_guard: None,
            }),
        }
    }

    fn build<P: AsRef<Path>>(
        paths: &[P],
        fallbacks: Vec<Value>,
        backend: Option<Rc<dyn Backend>>,
    ) -> Config {
        let mut sources: Vec<Rc<Source>> = Vec::new();
        let mut opened: HashSet<PathBuf> = HashSet::new();

        // User-directory documents first so they override system defaults.
        // Only the very first document may be created on demand: it is the
        // writable layer, everything after it merely contributes defaults.
        for system_dir in [false, true] {
            for path in paths {
                let source = Source::open(path, system_dir, sources.is_empty(), backend.clone());
                if let Some(source) = source {
                    if opened.insert(source.file_name().to_path_buf()) {
                        sources.push(source);
                    }
                }
            }
        }

        let mut atoms: Vec<NodeRef> = sources.iter().map(|source| source.data()).collect();
        for fallback in &fallbacks {
            let node = Node::from_value(fallback, true);
            if node.is_map() || node.is_list() {
                atoms.push(node);
            }
        }

        Config {
            d: Rc::new(ConfigInner {
                levels: RefCell::new(vec![Level::with_atoms(atoms)]),
                sources,
                memory_guard: None,
            }),
        }
    }

    /// Returns an independent cursor rooted at the named group, sharing
    /// nodes and sources with this one. Writes through the returned cursor
    /// are visible here and vice versa; the returned cursor keeps this one
    /// alive and leaves scheduling of saves to it.
    pub fn group(&self, name: &str) -> Config {
        self.begin_group(name);
        let child = ConfigInner {
            levels: RefCell::new(vec![self.d.current()]),
            sources: self.d.sources.clone(),
            memory_guard: Some(Rc::clone(&self.d)),
        };
        self.end_group();

        Config { d: Rc::new(child) }
    }

    /// Descends into the named group (slash-separated path), making it the
    /// current frame.
    pub fn begin_group(&self, name: &str) {
        assert!(!name.is_empty(), "group name must not be empty");
        let names = parse_names(name);
        assert!(!names.is_empty(), "group name must contain a key");

        let next = self
            .d
            .current()
            .child_path(&names)
            .convert(NodeType::Map);
        self.d.levels.borrow_mut().push(next);
    }

    /// Leaves the group entered by the matching [`Config::begin_group`].
    pub fn end_group(&self) {
        let mut levels = self.d.levels.borrow_mut();
        assert!(levels.len() > 1, "end_group without matching begin_group");
        levels.pop();
    }

    /// Descends into the named array and returns its current length.
    pub fn begin_array(&self, name: &str) -> usize {
        assert!(!name.is_empty(), "array name must not be empty");
        let names = parse_names(name);
        assert!(!names.is_empty(), "array name must contain a key");

        let next = self
            .d
            .current()
            .child_path(&names)
            .convert(NodeType::List);
        self.d.levels.borrow_mut().push(next);

        self.array_size()
    }

    /// Leaves the array entered by the matching [`Config::begin_array`],
    /// popping the active element frame first when one exists.
    pub fn end_array(&self) {
        let mut levels = self.d.levels.borrow_mut();
        assert!(levels.len() > 1, "end_array without matching begin_array");

        if levels.last().is_some_and(|level| level.array_element) {
            levels.pop();
        }

        assert!(levels.len() > 1, "end_array without matching begin_array");
        assert!(
            !levels.last().is_some_and(|level| level.array_element),
            "array frame expected on top of the stack"
        );
        levels.pop();
    }

    /// Makes element `index` of the current array the current frame,
    /// replacing any previously selected element. The element is addressed
    /// as a map; the writable layer grows the array on demand.
    pub fn set_array_index(&self, index: usize) {
        let mut levels = self.d.levels.borrow_mut();
        if levels.last().is_some_and(|level| level.array_element) {
            levels.pop();
        }

        let current = levels.last().cloned().unwrap_or_default();
        assert!(
            current.atoms.first().is_some_and(|atom| atom.is_list()),
            "set_array_index requires an array frame"
        );

        let mut element = current.child_index(index).convert(NodeType::Map);
        element.array_element = true;
        levels.push(element);
    }

    /// Returns an independent cursor positioned at element `index` of the
    /// current array, with the same sharing semantics as [`Config::group`].
    pub fn array_element(&self, index: usize) -> Config {
        let child = ConfigInner {
            levels: RefCell::new(vec![self.d.current()]),
            sources: self.d.sources.clone(),
            memory_guard: Some(Rc::clone(&self.d)),
        };
        let config = Config { d: Rc::new(child) };
        config.set_array_index(index);
        config
    }

    /// Length of the current array: the size of the first layered atom
    /// holding a non-empty list. Inside an element frame, the enclosing
    /// array is measured.
    pub fn array_size(&self) -> usize {
        let levels = self.d.levels.borrow();
        let level = match levels.last() {
            Some(level) if level.array_element => {
                levels.len().checked_sub(2).and_then(|i| levels.get(i))
            }
            other => other,
        };

        level.map_or(0, |level| {
            level
                .atoms
                .iter()
                .map(|atom| atom.array_size())
                .find(|size| *size > 0)
                .unwrap_or(0)
        })
    }

    /// Reads a key from the current group, walking the layers in order;
    /// the first present, non-null value wins. Missing keys yield
    /// `default`. A key containing `/` is read from the corresponding
    /// subgroup.
    pub fn value(&self, key: &str, default: impl Into<Value>) -> Value {
        self.value_with(key, default, ValueFlags::Normal)
    }

    /// [`Config::value`] with explicit flags; [`ValueFlags::Crypted`]
    /// passes the stored value through the crypto service before return.
    pub fn value_with(&self, key: &str, default: impl Into<Value>, flags: ValueFlags) -> Value {
        let default = default.into();
        if self.d.current().atoms.is_empty() {
            return default;
        }

        let (prefix, leaf) = split_key(key);
        if let Some(prefix) = prefix {
            self.begin_group(prefix);
        }

        let mut found = Value::Null;
        for atom in &self.d.current().atoms {
            debug_assert!(atom.is_map());
            if let Some(child) = atom.get_child(leaf) {
                let value = child.to_value();
                if !value.is_null() {
                    found = value;
                    break;
                }
            }
        }

        if prefix.is_some() {
            self.end_group();
        }

        finish_read(found, default, flags)
    }

    /// Materializes the whole current frame (its first layer) as one tree
    /// value, or `default` when the frame is empty.
    pub fn root_value(&self, default: impl Into<Value>, flags: ValueFlags) -> Value {
        let default = default.into();
        let current = self.d.current();
        match current.atoms.first() {
            Some(atom) => finish_read(atom.to_value(), default, flags),
            None => default,
        }
    }

    /// Writes a key in the current group through the writable layer,
    /// dirtying the backing source only when the stored value really
    /// changed. A key containing `/` writes into the corresponding
    /// subgroup.
    pub fn set_value(&self, key: &str, value: impl Into<Value>) {
        self.set_value_with(key, value, ValueFlags::Normal);
    }

    /// [`Config::set_value`] with explicit flags; [`ValueFlags::Crypted`]
    /// stores the encrypted form.
    pub fn set_value_with(&self, key: &str, value: impl Into<Value>, flags: ValueFlags) {
        if self.d.current().atoms.is_empty() {
            return;
        }

        let (prefix, leaf) = split_key(key);
        if let Some(prefix) = prefix {
            self.begin_group(prefix);
        }

        let value = value.into();
        let stored = match flags {
            ValueFlags::Normal => value,
            ValueFlags::Crypted => crypto::encrypt(&value),
        };

        let current = self.d.current();
        assert!(
            !current.atoms.is_empty(),
            "set_value requires a writable map layer"
        );
        let atom = current.atoms[0].clone();
        assert!(
            atom.is_map() && !atom.is_read_only(),
            "set_value requires a writable map layer"
        );

        if atom.replace_child(leaf, Node::from_value(&stored, false)) {
            if let Some(source) = self.d.sources.first() {
                source.make_dirty();
            }
        }

        if prefix.is_some() {
            self.end_group();
        }
    }

    /// Removes a key from the writable layer of the current group.
    /// Returns whether the key was present.
    pub fn remove_key(&self, name: &str) -> bool {
        let current = self.d.current();
        let Some(atom) = current.atoms.first() else {
            return false;
        };
        assert!(
            atom.is_map() && !atom.is_read_only(),
            "remove_key requires a writable map layer"
        );

        let removed = atom.remove_key(name);
        if removed {
            if let Some(source) = self.d.sources.first() {
                source.make_dirty();
            }
        }
        removed
    }

    /// Removes element `index` from the writable layer of the current
    /// array, popping the active element frame first when one exists.
    /// Returns false when the index is beyond the end.
    pub fn remove_index(&self, index: usize) -> bool {
        {
            let mut levels = self.d.levels.borrow_mut();
            if levels.last().is_some_and(|level| level.array_element) {
                levels.pop();
            }
        }

        let current = self.d.current();
        let Some(atom) = current.atoms.first() else {
            return false;
        };
        assert!(
            atom.is_list() && !atom.is_read_only(),
            "remove_index requires a writable array frame"
        );

        let removed = atom.remove_index(index);
        if removed {
            if let Some(source) = self.d.sources.first() {
                source.make_dirty();
            }
        }
        removed
    }

    /// Keys of the current group whose value is a map in some layer,
    /// deduplicated, first occurrence first.
    pub fn child_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        self.d.current().iterate_map(&mut |name, atom| {
            if atom.is_map() && !groups.iter().any(|seen| seen == name) {
                groups.push(name.to_string());
            }
        });
        groups
    }

    /// Keys of the current group whose first-seen value across the layers
    /// is not a map, deduplicated, first occurrence first.
    pub fn child_keys(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut keys: Vec<String> = Vec::new();
        self.d.current().iterate_map(&mut |name, atom| {
            if seen.iter().any(|known| known == name) {
                return;
            }
            seen.push(name.to_string());
            if !atom.is_map() {
                keys.push(name.to_string());
            }
        });
        keys
    }

    /// True when the current group has a subgroup of this name in any layer.
    pub fn has_child_group(&self, name: &str) -> bool {
        let mut found = false;
        self.d.current().iterate_map(&mut |key, atom| {
            if atom.is_map() && key == name {
                found = true;
            }
        });
        found
    }

    /// True when the first-seen value of this name across the layers is
    /// not a map.
    pub fn has_child_key(&self, name: &str) -> bool {
        let mut decided: Option<bool> = None;
        self.d.current().iterate_map(&mut |key, atom| {
            if key == name && decided.is_none() {
                decided = Some(!atom.is_map());
            }
        });
        decided.unwrap_or(false)
    }

    /// Schedules a deferred save for every dirty backing source. The write
    /// happens when the host event loop next drains the saver; see
    /// [`crate::saver`].
    pub fn sync(&self) {
        self.d.request_save();
    }
}

/// Splits a slash-separated path into its non-empty segments.
fn parse_names(full_name: &str) -> Vec<&str> {
    full_name
        .split('/')
        .filter(|name| !name.is_empty())
        .collect()
}

/// Splits a key on its last slash: the prefix is a temporary group, the
/// suffix the leaf key.
fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once('/') {
        Some((prefix, leaf)) => (Some(prefix), leaf),
        None => (None, key),
    }
}

fn finish_read(found: Value, default: Value, flags: ValueFlags) -> Value {
    if found.is_null() {
        return default;
    }
    match flags {
        ValueFlags::Normal => found,
        ValueFlags::Crypted => crypto::decrypt(&found),
    }
}
