//! Navigation frames over layered configuration nodes.
//!
//! A [`Level`] is one frame of a cursor's navigation stack: an ordered list
//! of node handles (atoms), one per layered source or fallback, plus a flag
//! marking frames that address a single array element. Atoms are ordered
//! writable-first; every atom after the first is treated as read-only during
//! navigation so that only the top layer can ever be written through.

use crate::node::{NodeRef, NodeType};

#[derive(Debug, Clone, Default)]
pub(crate) struct Level {
    pub atoms: Vec<NodeRef>,
    pub array_element: bool,
}

impl Level {
    pub fn with_atoms(atoms: Vec<NodeRef>) -> Level {
        Level {
            atoms,
            array_element: false,
        }
    }

    /// Maps each atom into the next frame. The callback receives the
    /// effective read-only flag: an atom's own flag, forced true for every
    /// atom after the first. Atoms mapped to `None` are omitted.
    fn map_atoms<F>(&self, callback: F) -> Level
    where
        F: Fn(&NodeRef, bool) -> Option<NodeRef>,
    {
        let mut atoms = Vec::with_capacity(self.atoms.len());
        let mut first = true;

        for atom in &self.atoms {
            let read_only = atom.is_read_only() || !first;
            first = false;

            if let Some(next) = callback(atom, read_only) {
                atoms.push(next);
            }
        }

        Level::with_atoms(atoms)
    }

    /// Descends into a map key across all layers. The writable atom creates
    /// intermediates; read-only layers contribute their existing child or
    /// drop out.
    pub fn child_key(&self, name: &str) -> Level {
        self.map_atoms(|atom, read_only| {
            if read_only {
                atom.get_child(name)
            } else {
                Some(atom.ensure_child(name))
            }
        })
    }

    /// Descends into a list index across all layers.
    pub fn child_index(&self, index: usize) -> Level {
        self.map_atoms(|atom, read_only| {
            if read_only {
                atom.get_index(index)
            } else {
                Some(atom.ensure_index(index))
            }
        })
    }

    /// Iterated [`Level::child_key`] over a parsed path.
    pub fn child_path(&self, names: &[&str]) -> Level {
        debug_assert!(!names.is_empty());

        let mut level = self.clone();
        for name in names {
            level = level.child_key(name);
        }
        level
    }

    /// Coerces every writable atom to `target`; read-only atoms of a
    /// different shape drop out.
    pub fn convert(&self, target: NodeType) -> Level {
        self.map_atoms(|atom, read_only| {
            if read_only {
                (atom.node_type() == target).then(|| atom.clone())
            } else {
                atom.convert(target);
                Some(atom.clone())
            }
        })
    }

    /// Yields each (key, child) pair of every map atom, in layer order.
    pub fn iterate_map(&self, callback: &mut dyn FnMut(&str, &NodeRef)) {
        for atom in &self.atoms {
            atom.iterate_map(callback);
        }
    }
}
