//! Component tree storage
//!
//! Components live in an arena keyed by [`NodeId`]. Children are owned by
//! their container's child list; the parent link is a back-reference only.
//! Names and ids are registered when a subtree is attached to the tree and
//! unregistered when it is removed. Names are unique; ids may repeat across
//! template items and resolve to the most recently attached component.

use crate::component::{Component, ComponentBuilder, ComponentKind, LoadType};
use crate::{GenerationError, NodeId, Result};
use std::collections::{HashMap, HashSet};

#[derive(Debug)]
pub struct ComponentTree {
    nodes: HashMap<NodeId, Component>,
    root: NodeId,
    names: HashMap<String, NodeId>,
    ids: HashMap<String, NodeId>,
    counters: HashMap<&'static str, usize>,
}

impl Default for ComponentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentTree {
    /// A tree holding only the document root
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId::new(),
            names: HashMap::new(),
            ids: HashMap::new(),
            counters: HashMap::new(),
        };
        let builder = ComponentBuilder::new(ComponentKind::Document);
        let id = tree.next_id(&builder);
        let root = Component::new(id.clone(), &builder);
        tree.root = root.node_id;
        tree.ids.insert(id, root.node_id);
        tree.nodes.insert(root.node_id, root);
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub fn get(&self, node: NodeId) -> Option<&Component> {
        self.nodes.get(&node)
    }

    pub fn get_mut(&mut self, node: NodeId) -> Option<&mut Component> {
        self.nodes.get_mut(&node)
    }

    /// The component, or a structural error naming the missing node
    pub fn component(&self, node: NodeId) -> Result<&Component> {
        self.nodes
            .get(&node)
            .ok_or_else(|| GenerationError::structural(format!("component {} is not in the tree", node)))
    }

    pub fn component_mut(&mut self, node: NodeId) -> Result<&mut Component> {
        self.nodes
            .get_mut(&node)
            .ok_or_else(|| GenerationError::structural(format!("component {} is not in the tree", node)))
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(&node).map(|c| c.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(&node).and_then(|c| c.parent)
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn find_by_id(&self, id: &str) -> Option<NodeId> {
        self.ids.get(id).copied()
    }

    fn next_id(&mut self, builder: &ComponentBuilder) -> String {
        if let Some(id) = &builder.id {
            return id.clone();
        }
        let prefix = builder.kind.id_prefix();
        let counter = self.counters.entry(prefix).or_insert(0);
        *counter += 1;
        format!("{}{}", prefix, counter)
    }

    /// Instantiate a builder subtree in the arena without attaching it.
    /// With an `owner`, the subtree root records it as its template owner and
    /// every created component is marked as template-loaded.
    pub fn create_detached(&mut self, builder: &ComponentBuilder, owner: Option<NodeId>) -> NodeId {
        let node = self.create_node(builder, owner.is_some());
        if let Some(c) = self.nodes.get_mut(&node) {
            c.template_owner = owner;
        }
        node
    }

    fn create_node(&mut self, builder: &ComponentBuilder, from_template: bool) -> NodeId {
        let id = self.next_id(builder);
        let mut component = Component::new(id, builder);
        if from_template {
            component.load_type = LoadType::Template;
        }
        let node = component.node_id;
        self.nodes.insert(node, component);

        for child in &builder.children {
            let child_node = self.create_node(child, from_template);
            if let Some(c) = self.nodes.get_mut(&child_node) {
                c.parent = Some(node);
            }
            if let Some(c) = self.nodes.get_mut(&node) {
                c.children.push(child_node);
            }
        }
        node
    }

    /// Attach a detached subtree under `parent` at `index` (appended when past the end).
    /// Fails, leaving the tree unchanged, when `parent` is not a container or a
    /// name in the subtree is already registered.
    pub fn attach(&mut self, parent: NodeId, index: Option<usize>, node: NodeId) -> Result<()> {
        let parent_component = self.component(parent)?;
        if !parent_component.kind.is_container() {
            return Err(GenerationError::structural(format!(
                "{} cannot hold child components",
                parent_component
            )));
        }
        if self.component(node)?.parent.is_some() {
            return Err(GenerationError::structural(format!("component {} is already attached", node)));
        }

        let subtree = self.descendants(node);
        let mut names = HashSet::new();
        for &n in &subtree {
            let component = self.component(n)?;
            if let Some(name) = &component.name {
                if self.names.contains_key(name) || !names.insert(name.clone()) {
                    return Err(GenerationError::structural(format!(
                        "a component named '{}' already exists in the document",
                        name
                    )));
                }
            }
        }

        for &n in &subtree {
            if let Some(component) = self.nodes.get(&n) {
                if let Some(name) = &component.name {
                    self.names.insert(name.clone(), n);
                }
                self.ids.insert(component.id.clone(), n);
                component.page_cache.set(None);
            }
        }

        if let Some(c) = self.nodes.get_mut(&node) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.nodes.get_mut(&parent) {
            let at = index.unwrap_or(p.children.len()).min(p.children.len());
            p.children.insert(at, node);
        }
        Ok(())
    }

    /// Create and attach a builder subtree as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, builder: &ComponentBuilder) -> Result<NodeId> {
        self.insert(parent, None, builder)
    }

    pub fn insert(&mut self, parent: NodeId, index: Option<usize>, builder: &ComponentBuilder) -> Result<NodeId> {
        let node = self.create_detached(builder, None);
        if let Err(e) = self.attach(parent, index, node) {
            self.discard_detached(node);
            return Err(e);
        }
        Ok(node)
    }

    /// Drop a subtree created by [`ComponentTree::create_detached`] that was never attached
    pub fn discard_detached(&mut self, node: NodeId) {
        for n in self.descendants(node) {
            self.nodes.remove(&n);
        }
    }

    /// Remove a component and its subtree, returning the removed components
    /// in pre-order
    pub fn remove(&mut self, node: NodeId) -> Result<Vec<Component>> {
        if node == self.root {
            return Err(GenerationError::structural("the document root cannot be removed"));
        }
        let parent = self.component(node)?.parent;
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|c| *c != node);
        }

        let mut removed = Vec::new();
        for n in self.descendants(node) {
            if let Some(component) = self.nodes.remove(&n) {
                if let Some(name) = &component.name {
                    if self.names.get(name) == Some(&n) {
                        self.names.remove(name);
                    }
                }
                if self.ids.get(&component.id) == Some(&n) {
                    self.ids.remove(&component.id);
                }
                removed.push(component);
            }
        }
        Ok(removed)
    }

    /// Position of `node` in its parent's child list
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|c| *c == node)
    }

    /// Ancestors from the parent up to the root
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |n| self.parent(*n))
    }

    /// The nearest container above `node`, with the child of that container
    /// on the path down to `node`
    pub fn container_ancestor(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        let mut below = node;
        for ancestor in self.ancestors(node) {
            if self.nodes.get(&ancestor).is_some_and(|c| c.kind.is_container()) {
                return Some((ancestor, below));
            }
            below = ancestor;
        }
        None
    }

    /// The page holding `node`, cached until the node is attached again
    pub fn page_of(&self, node: NodeId) -> Option<NodeId> {
        let component = self.nodes.get(&node)?;
        if let Some(page) = component.page_cache.get() {
            if self.contains(page) {
                return Some(page);
            }
        }
        let page = std::iter::once(node)
            .chain(self.ancestors(node))
            .find(|n| matches!(self.nodes.get(n).map(|c| &c.kind), Some(ComponentKind::Page)))?;
        component.page_cache.set(Some(page));
        Some(page)
    }

    /// `node` and everything below it, in pre-order
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            if let Some(component) = self.nodes.get(&n) {
                out.push(n);
                stack.extend(component.children.iter().rev());
            }
        }
        out
    }

    /// Pages directly under the root, in order
    pub fn pages(&self) -> Vec<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .filter(|n| matches!(self.nodes.get(n).map(|c| &c.kind), Some(ComponentKind::Page)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ComponentTree, NodeId, NodeId) {
        let mut tree = ComponentTree::new();
        let page = tree
            .append(
                tree.root(),
                &ComponentBuilder::page()
                    .named("first")
                    .child(ComponentBuilder::panel().child(ComponentBuilder::label("a"))),
            )
            .unwrap();
        let panel = tree.children(page)[0];
        (tree, page, panel)
    }

    #[test]
    fn test_generated_ids_per_kind() {
        let (tree, page, panel) = sample();
        assert_eq!(tree.component(page).unwrap().id(), "Pg1");
        assert_eq!(tree.component(panel).unwrap().id(), "Pnl1");
        assert_eq!(tree.find_by_id("Lbl1"), Some(tree.children(panel)[0]));
        assert_eq!(tree.find_by_name("first"), Some(page));
    }

    #[test]
    fn test_parent_links_are_bidirectional() {
        let (tree, page, panel) = sample();
        assert_eq!(tree.parent(panel), Some(page));
        assert_eq!(tree.parent(page), Some(tree.root()));
        assert_eq!(tree.index_of(panel), Some(0));
        for node in tree.descendants(tree.root()) {
            for child in tree.children(node) {
                assert_eq!(tree.parent(*child), Some(node));
            }
        }
    }

    #[test]
    fn test_duplicate_name_is_structural_and_leaves_tree_unchanged() {
        let (mut tree, page, _) = sample();
        let before = tree.len();
        let err = tree.append(page, &ComponentBuilder::label("dup").named("first")).unwrap_err();
        assert!(matches!(err, GenerationError::Structural(_)));
        assert_eq!(tree.len(), before);
        assert_eq!(tree.children(page).len(), 1);
    }

    #[test]
    fn test_repeated_id_resolves_to_latest_and_survives_removal() {
        let (mut tree, page, _) = sample();
        let first = tree.append(page, &ComponentBuilder::label("one").with_id("row")).unwrap();
        let second = tree.append(page, &ComponentBuilder::label("two").with_id("row")).unwrap();
        assert_eq!(tree.find_by_id("row"), Some(second));

        tree.remove(first).unwrap();
        assert_eq!(tree.find_by_id("row"), Some(second));
        tree.remove(second).unwrap();
        assert_eq!(tree.find_by_id("row"), None);
    }

    #[test]
    fn test_non_container_cannot_hold_children() {
        let (mut tree, _, panel) = sample();
        let label = tree.children(panel)[0];
        assert!(tree.append(label, &ComponentBuilder::label("b")).is_err());
    }

    #[test]
    fn test_remove_unregisters_names() {
        let (mut tree, page, _) = sample();
        let removed = tree.remove(page).unwrap();
        assert_eq!(removed.len(), 3);
        assert!(tree.find_by_name("first").is_none());
        assert!(tree.children(tree.root()).is_empty());
        assert!(tree.remove(tree.root()).is_err());

        tree.append(tree.root(), &ComponentBuilder::page().named("first")).unwrap();
    }

    #[test]
    fn test_container_ancestor_and_page_lookup() {
        let (tree, page, panel) = sample();
        let label = tree.children(panel)[0];
        assert_eq!(tree.container_ancestor(label), Some((panel, label)));
        assert_eq!(tree.page_of(label), Some(page));
        assert_eq!(tree.page_of(label), Some(page));
        assert_eq!(tree.container_ancestor(tree.root()), None);
    }
}
