use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::selector::Selector;

/// Shared handle to the page, mutated by the host and by the detector.
pub type Page = Arc<Mutex<Document>>;

/// Arena index of a node. Only meaningful for the document that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn expand(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + margin * 2.0,
            height: self.height + margin * 2.0,
        }
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right > left && bottom > top {
            Some(Rect::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_x: f64,
    pub scroll_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_x: 0.0,
            scroll_y: 0.0,
            width: 1280.0,
            height: 720.0,
        }
    }
}

impl Viewport {
    pub fn rect(&self) -> Rect {
        Rect::new(self.scroll_x, self.scroll_y, self.width, self.height)
    }
}

/// Nodes inserted under `target` since the last `take_mutations`.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    rect: Option<Rect>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
    viewport: Viewport,
    record_mutations: bool,
    mutations: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty `<html><head></head><body></body></html>` skeleton.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
            viewport: Viewport::default(),
            record_mutations: false,
            mutations: Vec::new(),
        };
        let root = doc.create_element("html");
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(root, head);
        doc.append_child(root, body);
        doc.root = root;
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn into_page(self) -> Page {
        Arc::new(Mutex::new(self))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn scroll_to(&mut self, y: f64) {
        self.viewport.scroll_y = y.max(0.0);
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
            rect: None,
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.contains(parent) || !self.contains(child) {
            return;
        }
        if self.ancestors(parent).contains(&child) {
            return;
        }
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);

        if self.record_mutations && self.is_connected(parent) {
            match self.mutations.last_mut() {
                Some(record) if record.target == parent => record.added.push(child),
                _ => self.mutations.push(MutationRecord {
                    target: parent,
                    added: vec![child],
                }),
            }
        }
    }

    pub fn append_element_with_text(&mut self, parent: NodeId, tag: &str, text: &str) -> NodeId {
        let element = self.create_element(tag);
        let content = self.create_text(text);
        self.append_child(element, content);
        self.append_child(parent, element);
        element
    }

    pub fn remove(&mut self, node: NodeId) {
        if self.contains(node) {
            self.detach(node);
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    pub(super) fn opaque(&self, node: NodeId) -> selectors::OpaqueElement {
        selectors::OpaqueElement::new(&self.nodes[node.0])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes
            .get(node.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Parent chain from the immediate parent up to the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(node);
        while let Some(id) = current {
            out.push(id);
            current = self.parent(id);
        }
        out
    }

    /// All nodes below `node` in document order, `node` excluded.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root || self.ancestors(node).last() == Some(&self.root)
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(
            self.nodes.get(node.0).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { tag, .. }) => Some(tag.as_str()),
            _ => None,
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(&str, &str)> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(NodeKind::Element { attributes, .. }) =
            self.nodes.get_mut(node.0).map(|n| &mut n.kind)
        {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Option<String> {
        match self.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes.shift_remove(name),
            _ => None,
        }
    }

    /// Native `id`, ignoring empty values.
    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "id").filter(|id| !id.is_empty())
    }

    pub fn classes(&self, node: NodeId) -> Vec<&str> {
        self.attribute(node, "class")
            .map(|value| value.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).contains(&class)
    }

    pub fn add_class(&mut self, node: NodeId, class: &str) -> bool {
        if !self.is_element(node) || self.has_class(node, class) {
            return false;
        }
        let mut classes: Vec<String> = self.classes(node).into_iter().map(String::from).collect();
        classes.push(class.to_string());
        self.set_attribute(node, "class", &classes.join(" "));
        true
    }

    pub fn remove_class(&mut self, node: NodeId, class: &str) -> bool {
        if !self.has_class(node, class) {
            return false;
        }
        let remaining: Vec<String> = self
            .classes(node)
            .into_iter()
            .filter(|c| *c != class)
            .map(String::from)
            .collect();
        if remaining.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &remaining.join(" "));
        }
        true
    }

    pub fn text_content(&self, node: NodeId) -> String {
        if let Some(text) = self.text(node) {
            return text.to_string();
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|id| self.text(id))
            .collect()
    }

    pub fn rect(&self, node: NodeId) -> Option<Rect> {
        self.nodes.get(node.0).and_then(|n| n.rect)
    }

    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.rect = Some(rect);
        }
    }

    pub fn set_mutation_recording(&mut self, enabled: bool) {
        self.record_mutations = enabled;
        if !enabled {
            self.mutations.clear();
        }
    }

    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Connected elements in document order, root included.
    pub fn elements(&self) -> Vec<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .filter(|id| self.is_element(*id))
            .collect()
    }

    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.find_by_attribute("id", id)
    }

    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        self.elements()
            .into_iter()
            .find(|node| self.attribute(*node, name) == Some(value))
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        selector.matches(self, node)
    }

    /// First matching descendant of `scope`, `scope` itself excluded.
    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|node| self.is_element(*node) && selector.matches(self, *node))
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| self.is_element(*node) && selector.matches(self, *node))
            .collect()
    }

    /// `node` or its nearest ancestor matching `selector`.
    pub fn closest(&self, node: NodeId, selector: &Selector) -> Option<NodeId> {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find(|id| self.is_element(*id) && selector.matches(self, *id))
    }
}
