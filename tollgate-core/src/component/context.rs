//! [`ControlContext`]: a component's place in the tree — parent, root
//! registry, name-path, child set, and state.
//!
//! Ownership flows one way: a parent [`ControlContext`] strongly owns its
//! children; a child only holds a [`Weak`] edge back to its parent. The
//! whole tree is therefore dropped from the root down with no cycles to
//! break by hand.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::error::Error;

use super::state::ComponentState;

struct Registry {
    by_name: RefCell<HashMap<Arc<str>, Weak<Node>>>,
}

struct Node {
    name: Arc<str>,
    class: &'static str,
    parent: RefCell<Option<Weak<Node>>>,
    registry: Rc<Registry>,
    state: Cell<ComponentState>,
    transitioning: Cell<bool>,
    children: RefCell<Vec<Rc<Node>>>,
    /// Numbers already claimed by anonymous children, keyed by child class.
    anon_seq: RefCell<HashMap<&'static str, BTreeSet<u32>>>,
}

/// A cheaply-cloneable handle into the component tree. Clones refer to the
/// same node; there is exactly one owning path to each node (root →
/// ... → parent), held by the parent's `children` vector.
#[derive(Clone)]
pub struct ControlContext {
    node: Rc<Node>,
}

impl ControlContext {
    /// Creates a fresh root with no parent, owning a new name registry.
    pub fn root(name: impl Into<Arc<str>>, class: &'static str) -> Self {
        let name = name.into();
        let registry = Rc::new(Registry {
            by_name: RefCell::new(HashMap::new()),
        });
        let node = Rc::new(Node {
            name: name.clone(),
            class,
            parent: RefCell::new(None),
            registry,
            state: Cell::new(ComponentState::New),
            transitioning: Cell::new(false),
            children: RefCell::new(Vec::new()),
            anon_seq: RefCell::new(HashMap::new()),
        });
        node.registry
            .by_name
            .borrow_mut()
            .insert(name, Rc::downgrade(&node));
        ControlContext { node }
    }

    /// Attaches a new child. `name: None` synthesizes `<lowerCamelClass><n>`
    /// from `class`, choosing the smallest unused `n` among this node's
    /// direct children of the same class. A duplicate explicit name
    /// anywhere under the same root is an [`Error::AlreadyBound`].
    pub fn attach_child(
        &self,
        name: Option<&str>,
        class: &'static str,
    ) -> Result<ControlContext, Error> {
        let final_name: Arc<str> = match name {
            Some(n) => Arc::from(n),
            None => self.synthesize_anonymous_name(class),
        };

        let mut by_name = self.node.registry.by_name.borrow_mut();
        if let Some(existing) = by_name.get(&final_name) {
            if existing.upgrade().is_some() {
                return Err(Error::AlreadyBound(final_name.to_string()));
            }
        }
        let child = Rc::new(Node {
            name: final_name.clone(),
            class,
            parent: RefCell::new(Some(Rc::downgrade(&self.node))),
            registry: self.node.registry.clone(),
            state: Cell::new(ComponentState::New),
            transitioning: Cell::new(false),
            children: RefCell::new(Vec::new()),
            anon_seq: RefCell::new(HashMap::new()),
        });
        by_name.insert(final_name, Rc::downgrade(&child));
        self.node.children.borrow_mut().push(child.clone());
        Ok(ControlContext { node: child })
    }

    fn synthesize_anonymous_name(&self, class: &'static str) -> Arc<str> {
        let lower_camel = {
            let mut chars = class.chars();
            match chars.next() {
                Some(c) => c.to_lowercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        };
        let mut seq = self.node.anon_seq.borrow_mut();
        let used = seq.entry(class).or_insert_with(BTreeSet::new);
        let mut n: u32 = 1;
        while used.contains(&n) {
            n += 1;
        }
        used.insert(n);
        Arc::from(format!("{lower_camel}{n}"))
    }

    /// Detaches this node from its parent's child list and the root's
    /// name registry. Called once a component finishes its final `stop`.
    pub fn detach(&self) {
        self.node.registry.by_name.borrow_mut().remove(&self.node.name);
        if let Some(parent) = self.node.parent.borrow().as_ref().and_then(Weak::upgrade) {
            parent
                .children
                .borrow_mut()
                .retain(|c| !Rc::ptr_eq(c, &self.node));
        }
    }

    pub fn name(&self) -> &str {
        &self.node.name
    }

    pub fn class(&self) -> &'static str {
        self.node.class
    }

    /// Root-to-self sequence of names.
    pub fn name_path(&self) -> Vec<Arc<str>> {
        let mut path = vec![self.node.name.clone()];
        let mut current = self.node.parent.borrow().as_ref().and_then(Weak::upgrade);
        while let Some(node) = current {
            path.push(node.name.clone());
            current = node.parent.borrow().as_ref().and_then(Weak::upgrade);
        }
        path.reverse();
        path
    }

    pub fn name_path_string(&self) -> String {
        self.name_path()
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The logger view for this component, drilled into by name-path.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("component", path = %self.name_path_string(), class = self.node.class)
    }

    pub fn state(&self) -> ComponentState {
        self.node.state.get()
    }

    pub fn children(&self) -> Vec<ControlContext> {
        self.node
            .children
            .borrow()
            .iter()
            .cloned()
            .map(|node| ControlContext { node })
            .collect()
    }

    /// Begins a transition out of `from`. Fails if the current state isn't
    /// `from` or a transition is already in flight (reentrancy guard,
    /// needed because hooks are `async` and may interleave with another
    /// caller before the first transition's hook resolves).
    pub(super) fn begin_transition(&self, from: ComponentState) -> Result<(), Error> {
        if self.node.transitioning.get() {
            return Err(Error::IllegalState(format!(
                "{}: transition already in progress",
                self.name_path_string()
            )));
        }
        if self.node.state.get() != from {
            return Err(Error::IllegalState(format!(
                "{}: expected state {:?}, found {:?}",
                self.name_path_string(),
                from,
                self.node.state.get()
            )));
        }
        self.node.transitioning.set(true);
        Ok(())
    }

    pub(super) fn end_transition(&self, to: ComponentState) {
        self.node.state.set(to);
        self.node.transitioning.set(false);
    }

    /// Rolls back a transition left incomplete by a failing hook,
    /// returning the component to the state it was in before
    /// `begin_transition` was called.
    pub(super) fn abort_transition(&self, back_to: ComponentState) {
        self.node.state.set(back_to);
        self.node.transitioning.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_explicit_name_is_rejected() {
        let root = ControlContext::root("root", "Warehouse");
        root.attach_child(Some("svc"), "Service").unwrap();
        let err = root.attach_child(Some("svc"), "Service").unwrap_err();
        assert!(matches!(err, Error::AlreadyBound(_)));
    }

    #[test]
    fn anonymous_children_get_smallest_unused_index() {
        let root = ControlContext::root("root", "Warehouse");
        let a = root.attach_child(None, "PathRouter").unwrap();
        let b = root.attach_child(None, "PathRouter").unwrap();
        assert_eq!(a.name(), "pathRouter1");
        assert_eq!(b.name(), "pathRouter2");
        a.detach();
        let c = root.attach_child(None, "PathRouter").unwrap();
        assert_eq!(c.name(), "pathRouter1");
    }

    #[test]
    fn name_path_reflects_tree_position() {
        let root = ControlContext::root("root", "Warehouse");
        let svc = root.attach_child(Some("services"), "ServiceManager").unwrap();
        let child = svc.attach_child(Some("limiter"), "TokenBucketService").unwrap();
        assert_eq!(child.name_path_string(), "root.services.limiter");
    }

    #[test]
    fn detach_frees_the_name_for_reuse() {
        let root = ControlContext::root("root", "Warehouse");
        let first = root.attach_child(Some("x"), "Service").unwrap();
        first.detach();
        assert!(root.attach_child(Some("x"), "Service").is_ok());
    }
}
