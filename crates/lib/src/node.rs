//! Shared configuration nodes.
//!
//! A [`Node`] is one cell of a loaded configuration tree: a map of named
//! children, a list of indexed children, a leaf scalar, or null. Nodes are
//! shared by reference count across every cursor that navigates into them;
//! the scheduling model is single-threaded, so plain `Rc` and `RefCell`
//! suffice. Trees are acyclic by construction (children never refer back to
//! ancestors), so reference cycles cannot occur.
//!
//! Every node carries a read-only flag fixed at construction. Children built
//! by navigation inherit the flag, and no operation mutates a read-only
//! node: navigating into a missing key of a read-only map yields nothing
//! instead of allocating a fresh null child.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::value::Value;

/// Shared handle to a configuration node.
pub type NodeRef = Rc<Node>;

/// The tag of a [`Node`]: which of the four shapes it currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    /// String-keyed children
    Map,
    /// Densely packed indexed children
    List,
    /// Leaf value
    Scalar,
    /// Absent
    Null,
}

#[derive(Debug)]
enum NodeKind {
    Map(BTreeMap<String, NodeRef>),
    List(Vec<NodeRef>),
    Scalar(Value),
    Null,
}

/// One cell of a configuration tree.
///
/// Exactly one of the four shapes is inhabited at a time; converting between
/// shapes destroys the prior payload. Mutating operations are crate-internal
/// and are only ever applied to writable nodes — the cursor layer guarantees
/// that writes go through the top writable layer alone.
#[derive(Debug)]
pub struct Node {
    read_only: bool,
    kind: RefCell<NodeKind>,
}

impl Node {
    pub(crate) fn new(read_only: bool) -> NodeRef {
        Rc::new(Node {
            read_only,
            kind: RefCell::new(NodeKind::Null),
        })
    }

    /// Builds a node tree from a tree value. The read-only flag propagates
    /// to the entire subtree.
    pub fn from_value(value: &Value, read_only: bool) -> NodeRef {
        let kind = match value {
            Value::Null => NodeKind::Null,
            Value::Map(map) => NodeKind::Map(
                map.iter()
                    .map(|(key, child)| (key.clone(), Node::from_value(child, read_only)))
                    .collect(),
            ),
            Value::List(list) => NodeKind::List(
                list.iter()
                    .map(|child| Node::from_value(child, read_only))
                    .collect(),
            ),
            leaf => NodeKind::Scalar(leaf.clone()),
        };

        Rc::new(Node {
            read_only,
            kind: RefCell::new(kind),
        })
    }

    /// Materializes this subtree as a tree value for serialization.
    pub fn to_value(&self) -> Value {
        match &*self.kind.borrow() {
            NodeKind::Map(map) => Value::Map(
                map.iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect(),
            ),
            NodeKind::List(list) => Value::List(list.iter().map(|child| child.to_value()).collect()),
            NodeKind::Scalar(value) => value.clone(),
            NodeKind::Null => Value::Null,
        }
    }

    /// Returns the current shape of this node.
    pub fn node_type(&self) -> NodeType {
        match &*self.kind.borrow() {
            NodeKind::Map(_) => NodeType::Map,
            NodeKind::List(_) => NodeType::List,
            NodeKind::Scalar(_) => NodeType::Scalar,
            NodeKind::Null => NodeType::Null,
        }
    }

    /// Returns true if this node (and therefore its subtree) is read-only.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_map(&self) -> bool {
        self.node_type() == NodeType::Map
    }

    pub fn is_list(&self) -> bool {
        self.node_type() == NodeType::List
    }

    pub fn is_scalar(&self) -> bool {
        self.node_type() == NodeType::Scalar
    }

    pub fn is_null(&self) -> bool {
        self.node_type() == NodeType::Null
    }

    /// Number of elements when this node is a list, 0 otherwise.
    pub fn array_size(&self) -> usize {
        match &*self.kind.borrow() {
            NodeKind::List(list) => list.len(),
            _ => 0,
        }
    }

    /// Read-path map navigation: the existing child, if this node is a map
    /// and the key is present. Never allocates.
    pub(crate) fn get_child(&self, key: &str) -> Option<NodeRef> {
        match &*self.kind.borrow() {
            NodeKind::Map(map) => map.get(key).cloned(),
            _ => None,
        }
    }

    /// Write-path map navigation: coerces this node to a map and inserts a
    /// null child if the key is absent. Caller must hold the only writable
    /// layer.
    pub(crate) fn ensure_child(&self, key: &str) -> NodeRef {
        debug_assert!(!self.read_only);

        let mut kind = self.kind.borrow_mut();
        if !matches!(*kind, NodeKind::Map(_)) {
            *kind = NodeKind::Map(BTreeMap::new());
        }
        match &mut *kind {
            NodeKind::Map(map) => map
                .entry(key.to_string())
                .or_insert_with(|| Node::new(self.read_only))
                .clone(),
            _ => unreachable!("node was just coerced to a map"),
        }
    }

    /// Read-path list navigation: the existing element, if this node is a
    /// list and the index is in range.
    pub(crate) fn get_index(&self, index: usize) -> Option<NodeRef> {
        match &*self.kind.borrow() {
            NodeKind::List(list) => list.get(index).cloned(),
            _ => None,
        }
    }

    /// Write-path list navigation: coerces this node to a list and grows it
    /// with null elements up to `index` inclusive.
    pub(crate) fn ensure_index(&self, index: usize) -> NodeRef {
        debug_assert!(!self.read_only);

        let mut kind = self.kind.borrow_mut();
        if !matches!(*kind, NodeKind::List(_)) {
            *kind = NodeKind::List(Vec::new());
        }
        match &mut *kind {
            NodeKind::List(list) => {
                while list.len() <= index {
                    list.push(Node::new(self.read_only));
                }
                list[index].clone()
            }
            _ => unreachable!("node was just coerced to a list"),
        }
    }

    /// Coerces the shape of a writable node, destroying the prior payload
    /// when the shape differs.
    pub(crate) fn convert(&self, target: NodeType) {
        debug_assert!(!self.read_only);

        if self.node_type() == target {
            return;
        }

        let mut kind = self.kind.borrow_mut();
        *kind = match target {
            NodeType::Map => NodeKind::Map(BTreeMap::new()),
            NodeType::List => NodeKind::List(Vec::new()),
            NodeType::Scalar => NodeKind::Scalar(Value::Null),
            NodeType::Null => NodeKind::Null,
        };
    }

    /// Stores `child` under `key`, reporting whether the stored value really
    /// changed. Equal old and new subtrees (by materialized tree value)
    /// leave the map untouched, which is what keeps no-op writes from
    /// dirtying the source.
    pub(crate) fn replace_child(&self, key: &str, child: NodeRef) -> bool {
        debug_assert!(!self.read_only);
        debug_assert!(self.is_map());

        let mut kind = self.kind.borrow_mut();
        let NodeKind::Map(map) = &mut *kind else {
            return false;
        };

        if let Some(existing) = map.get(key) {
            if existing.to_value() == child.to_value() {
                return false;
            }
        }
        map.insert(key.to_string(), child);
        true
    }

    /// Removes a map entry, reporting whether the key was present.
    pub(crate) fn remove_key(&self, key: &str) -> bool {
        debug_assert!(!self.read_only);
        debug_assert!(self.is_map());

        match &mut *self.kind.borrow_mut() {
            NodeKind::Map(map) => map.remove(key).is_some(),
            _ => false,
        }
    }

    /// Removes a list element, reporting whether the index was in range.
    pub(crate) fn remove_index(&self, index: usize) -> bool {
        debug_assert!(!self.read_only);
        debug_assert!(self.is_list());

        match &mut *self.kind.borrow_mut() {
            NodeKind::List(list) => {
                if index < list.len() {
                    list.remove(index);
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Yields each (key, child) pair when this node is a map. The callback
    /// must not navigate back into this node.
    pub(crate) fn iterate_map(&self, callback: &mut dyn FnMut(&str, &NodeRef)) {
        if let NodeKind::Map(map) = &*self.kind.borrow() {
            for (key, child) in map {
                callback(key, child);
            }
        }
    }
}
