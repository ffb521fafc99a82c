use crate::cache::change_aware_cache::FxIndexMap;
use crate::change::{Change, ChangeReason};
use crate::changeset::ChangeSet;
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::sync::Arc;

/// One node of the tree [`TreeBuilder`] maintains: a key/value pair,
/// its parent (a weak back-reference, so a subtree does not keep its
/// ancestors alive), and the child nodes it exclusively owns.
///
/// A node's children are dropped in `Vec` order when the node itself
/// is dropped, which is bottom-up with respect to a detached subtree:
/// each child's own children drop before the child does, recursively.
pub struct Node<K, V> {
    key: K,
    value: V,
    parent: RefCellWeak<K, V>,
    children: std::cell::RefCell<Vec<Rc<Node<K, V>>>>,
}

// A small alias so `Node`'s field list reads without a `RefCell<Weak<..>>`
// double-generic wart.
type RefCellWeak<K, V> = std::cell::RefCell<Weak<Node<K, V>>>;

impl<K, V> Node<K, V> {
    /// The node's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// The node's value.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// The parent node, if this node is not currently a root.
    pub fn parent(&self) -> Option<Rc<Node<K, V>>> {
        self.parent.borrow().upgrade()
    }

    /// This node's current children, in insertion order.
    pub fn children(&self) -> Vec<Rc<Node<K, V>>> {
        self.children.borrow().clone()
    }
}

/// Builds and incrementally maintains a forest over a flat keyed
/// stream: each value names its own parent key via `parent_key_of`
/// (`None` for a root). Re-parenting on `Update`/`Refresh` detaches a
/// node from its old parent's child list and attaches it to the new
/// one; nodes whose parent key does not (yet) resolve to a live key
/// are held as roots until that parent arrives.
///
/// Emits one changeset of root-level nodes: a key entering or leaving
/// the root set (because it gained, lost, or changed its own
/// membership as a root) is `Add`/`Remove`/`Update` on the returned
/// changeset; purely internal re-parenting below an unchanged root is
/// not itself surfaced there — inspect the affected node's `children()`
/// for that.
pub struct TreeBuilder<K, V> {
    parent_key_of: Arc<dyn Fn(&V) -> Option<K> + Send + Sync>,
    nodes: FxIndexMap<K, Rc<Node<K, V>>>,
    roots: FxIndexMap<K, Rc<Node<K, V>>>,
}

impl<K, V> TreeBuilder<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// A tree builder with no nodes yet observed, parenting values via
    /// `parent_key_of`.
    pub fn new(parent_key_of: impl Fn(&V) -> Option<K> + Send + Sync + 'static) -> Self {
        TreeBuilder {
            parent_key_of: Arc::new(parent_key_of),
            nodes: FxIndexMap::default(),
            roots: FxIndexMap::default(),
        }
    }

    fn detach(&mut self, key: &K) {
        let node = match self.nodes.get(key) {
            Some(n) => n.clone(),
            None => return,
        };
        match node.parent() {
            Some(parent) => {
                parent.children.borrow_mut().retain(|c| c.key != *key);
            }
            None => {
                self.roots.shift_remove(key);
            }
        }
    }

    fn attach(&mut self, key: &K, node: Rc<Node<K, V>>) {
        match (self.parent_key_of)(&node.value).and_then(|pk| self.nodes.get(&pk).cloned()) {
            Some(parent) => {
                *node.parent.borrow_mut() = Rc::downgrade(&parent);
                parent.children.borrow_mut().push(node);
            }
            None => {
                *node.parent.borrow_mut() = Weak::new();
                self.roots.insert(key.clone(), node);
            }
        }
    }

    /// Re-parents any already-known node whose declared parent key is
    /// `key`, now that `key` itself has arrived or moved. Used so a
    /// child seen before its parent (parent key not yet present) is
    /// reconciled once the parent shows up.
    fn adopt_orphans(&mut self, parent_key: &K, out: &mut Vec<Change<K, Rc<Node<K, V>>>>) {
        let orphan_keys: Vec<K> = self
            .roots
            .iter()
            .filter(|(k, node)| *k != parent_key && (self.parent_key_of)(&node.value).as_ref() == Some(parent_key))
            .map(|(k, _)| k.clone())
            .collect();
        for ok in orphan_keys {
            if let Some(node) = self.roots.shift_remove(&ok) {
                out.push(Change::remove(ok.clone(), node.clone()));
                self.attach(&ok, node);
            }
        }
    }

    /// Applies an upstream changeset, returning the changeset of
    /// root-level node changes.
    pub fn process(&mut self, changes: &ChangeSet<K, V>) -> ChangeSet<K, Rc<Node<K, V>>> {
        let mut out = Vec::new();
        for change in changes.iter() {
            match change.reason() {
                ChangeReason::Add => {
                    let node = Rc::new(Node {
                        key: change.key().clone(),
                        value: change.current().clone(),
                        parent: std::cell::RefCell::new(Weak::new()),
                        children: std::cell::RefCell::new(Vec::new()),
                    });
                    self.nodes.insert(change.key().clone(), node.clone());
                    self.attach(change.key(), node.clone());
                    if self.roots.contains_key(change.key()) {
                        out.push(Change::add(change.key().clone(), node));
                    }
                    self.adopt_orphans(change.key(), &mut out);
                }
                ChangeReason::Update | ChangeReason::Refresh => {
                    let old_node = self.nodes.get(change.key()).cloned();
                    let was_root = old_node.as_ref().map(|n| self.roots.contains_key(&n.key)).unwrap_or(false);
                    let existing_children = old_node.as_ref().map(|n| n.children.borrow().clone()).unwrap_or_default();
                    self.detach(change.key());
                    let node = Rc::new(Node {
                        key: change.key().clone(),
                        value: change.current().clone(),
                        parent: std::cell::RefCell::new(Weak::new()),
                        children: std::cell::RefCell::new(existing_children),
                    });
                    self.nodes.insert(change.key().clone(), node.clone());
                    self.attach(change.key(), node.clone());
                    let is_root = self.roots.contains_key(change.key());
                    match (was_root, is_root) {
                        (true, true) => {
                            if let Some(old) = old_node {
                                out.push(Change::update(change.key().clone(), node, old));
                            }
                        }
                        (true, false) => {
                            if let Some(old) = old_node {
                                out.push(Change::remove(change.key().clone(), old));
                            }
                        }
                        (false, true) => out.push(Change::add(change.key().clone(), node)),
                        (false, false) => {}
                    }
                }
                ChangeReason::Remove => {
                    let was_root = self.roots.contains_key(change.key());
                    self.detach(change.key());
                    if let Some(node) = self.nodes.shift_remove(change.key()) {
                        // Orphaned children become roots of their own until
                        // reconciled by a later change naming this key again.
                        for child in node.children.borrow().iter() {
                            *child.parent.borrow_mut() = Weak::new();
                            self.roots.insert(child.key.clone(), child.clone());
                        }
                        if was_root {
                            out.push(Change::remove(change.key().clone(), node));
                        }
                    }
                }
                ChangeReason::Moved => {}
            }
        }
        ChangeSet::from_changes(out)
    }

    /// The current root nodes, in no particular order.
    pub fn roots(&self) -> Vec<Rc<Node<K, V>>> {
        self.roots.values().cloned().collect()
    }

    /// Looks up a node anywhere in the forest by key.
    pub fn node(&self, key: &K) -> Option<Rc<Node<K, V>>> {
        self.nodes.get(key).cloned()
    }
}
