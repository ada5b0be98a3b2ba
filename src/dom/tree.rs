use std::{collections::BTreeMap, fmt};

use thiserror::Error;

use super::{selector::Selector, spec::NodeSpec};

/// Handle into the document arena. Handles are never reused, so a handle held
/// across an await point stays valid even if the host removes the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0} does not exist in this document")]
    UnknownNode(NodeId),
    #[error("cannot insert {child} into {parent}: it would create a cycle")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("reference node {reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },
    #[error("the document root cannot be moved or removed")]
    RootImmutable,
}

#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A childList change, the unit delivered to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: Option<NodeId>,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Arena-backed element tree rooted at a `<body>` element.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
    observing: bool,
    records: Vec<MutationRecord>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Element::new("body")],
            root: NodeId(0),
            observing: false,
            records: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id.0)
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut Element, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn ensure(&self, id: NodeId) -> Result<(), DomError> {
        self.get(id).map(|_| ()).ok_or(DomError::UnknownNode(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|el| el.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|el| el.children.as_slice()).unwrap_or(&[])
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id).and_then(|el| el.attr(name))
    }

    /// Starts recording childList mutations, like `MutationObserver.observe`.
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Drains the mutation records gathered since the last call.
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    fn record(&mut self, record: MutationRecord) {
        if self.observing {
            self.records.push(record);
        }
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.nodes.push(Element::new(tag));
        NodeId(self.nodes.len() - 1)
    }

    /// Materialises a detached subtree from its description.
    pub fn build(&mut self, spec: &NodeSpec) -> NodeId {
        let id = self.create_element(&spec.tag);
        {
            let element = &mut self.nodes[id.0];
            element.attributes = spec.attrs.clone();
            element.text = spec.text.clone();
        }
        for child_spec in &spec.children {
            let child = self.build(child_spec);
            self.nodes[child.0].parent = Some(id);
            self.nodes[id.0].children.push(child);
        }
        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        self.get_mut(id)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    pub fn clear_attrs(&mut self, id: NodeId) -> Result<(), DomError> {
        self.get_mut(id)?.attributes.clear();
        Ok(())
    }

    /// Replaces the element's content with plain text, dropping any children.
    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        let element = self.get_mut(id)?;
        element.text = text.to_string();
        let removed = std::mem::take(&mut element.children);
        for child in &removed {
            self.nodes[child.0].parent = None;
        }
        if !removed.is_empty() {
            self.record(MutationRecord {
                target: Some(id),
                added: Vec::new(),
                removed,
            });
        }
        Ok(())
    }

    /// Own text followed by descendants' text in document order.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        if let Some(element) = self.get(id) {
            out.push_str(&element.text);
            for child in &element.children {
                self.collect_text(*child, out);
            }
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` before `reference` (or last when `None`), detaching it
    /// from its previous parent first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.ensure(parent)?;
        self.ensure(child)?;
        if child == self.root {
            return Err(DomError::RootImmutable);
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild { parent, reference });
            }
            if reference == child {
                return Ok(());
            }
        }

        self.detach(child);
        let index = match reference {
            Some(reference) => self.nodes[parent.0]
                .children
                .iter()
                .position(|c| *c == reference)
                .ok_or(DomError::NotAChild { parent, reference })?,
            None => self.nodes[parent.0].children.len(),
        };
        self.nodes[parent.0].children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.record(MutationRecord {
            target: Some(parent),
            added: vec![child],
            removed: Vec::new(),
        });
        Ok(())
    }

    /// Detaches the subtree from its parent. The nodes stay in the arena.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DomError> {
        self.ensure(id)?;
        if id == self.root {
            return Err(DomError::RootImmutable);
        }
        self.detach(id);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.nodes[id.0].parent.take() else {
            return;
        };
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.record(MutationRecord {
            target: Some(parent),
            added: Vec::new(),
            removed: vec![id],
        });
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        self.get(id).is_some() && self.is_inclusive_ancestor(self.root, id)
    }

    /// Descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
        selector.matches(self, id)
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
        let mut cursor = self.get(id).map(|_| id);
        while let Some(current) = cursor {
            if selector.matches(self, current) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|node| selector.matches(self, *node))
    }

    /// Connected element carrying the given `id` attribute.
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|node| self.attr(*node, "id") == Some(value))
    }

    /// Short human readable label, e.g. `article#post-1[data-testid=tweet]`.
    pub fn describe(&self, id: NodeId) -> String {
        let Some(element) = self.get(id) else {
            return id.to_string();
        };
        let mut label = element.tag.clone();
        if let Some(html_id) = element.attr("id") {
            label.push('#');
            label.push_str(html_id);
        }
        if let Some(testid) = element.attr("data-testid") {
            label.push_str(&format!("[data-testid={testid}]"));
        }
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, text: &str) -> NodeSpec {
        NodeSpec::element("article")
            .attr("id", id)
            .attr("data-testid", "tweet")
            .child(
                NodeSpec::element("div")
                    .attr("data-testid", "tweetText")
                    .child(NodeSpec::element("span").text(text)),
            )
    }

    #[test]
    fn build_and_append_connects_subtree() {
        let mut doc = Document::new();
        let article = doc.build(&post("p1", "본문"));
        assert!(!doc.is_connected(article));
        doc.append_child(doc.root(), article).unwrap();
        assert!(doc.is_connected(article));
        assert_eq!(doc.text_content(article), "본문");
        assert_eq!(doc.element_by_id("p1"), Some(article));
    }

    #[test]
    fn records_only_while_observed() {
        let mut doc = Document::new();
        let first = doc.build(&post("p1", "a"));
        doc.append_child(doc.root(), first).unwrap();
        assert!(doc.take_records().is_empty());

        doc.observe();
        let second = doc.build(&post("p2", "b"));
        doc.append_child(doc.root(), second).unwrap();
        doc.remove(first).unwrap();
        let records = doc.take_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].added, vec![second]);
        assert_eq!(records[1].removed, vec![first]);
        assert!(doc.take_records().is_empty());
    }

    #[test]
    fn insert_before_places_node_ahead_of_reference() {
        let mut doc = Document::new();
        let article = doc.build(&post("p1", "a"));
        doc.append_child(doc.root(), article).unwrap();
        let region = doc.children(article)[0];
        let banner = doc.create_element("div");
        doc.insert_before(article, banner, Some(region)).unwrap();
        assert_eq!(doc.children(article), &[banner, region]);
    }

    #[test]
    fn rejects_cycles_and_foreign_references() {
        let mut doc = Document::new();
        let article = doc.build(&post("p1", "a"));
        doc.append_child(doc.root(), article).unwrap();
        let region = doc.children(article)[0];
        assert_eq!(
            doc.append_child(region, article),
            Err(DomError::HierarchyRequest {
                parent: region,
                child: article
            })
        );
        let loose = doc.create_element("div");
        let other = doc.create_element("div");
        assert_eq!(
            doc.insert_before(article, loose, Some(other)),
            Err(DomError::NotAChild {
                parent: article,
                reference: other
            })
        );
        assert_eq!(doc.remove(doc.root()), Err(DomError::RootImmutable));
    }

    #[test]
    fn closest_includes_self_and_walks_up() {
        let mut doc = Document::new();
        let article = doc.build(&post("p1", "a"));
        doc.append_child(doc.root(), article).unwrap();
        let container = Selector::parse(r#"[data-testid="tweet"]"#).unwrap();
        let span = doc.descendants(article)[1];
        assert_eq!(doc.closest(span, &container), Some(article));
        assert_eq!(doc.closest(article, &container), Some(article));
        assert_eq!(doc.closest(doc.root(), &container), None);
    }

    #[test]
    fn set_text_replaces_children() {
        let mut doc = Document::new();
        let article = doc.build(&post("p1", "a"));
        doc.set_text(article, "plain").unwrap();
        assert!(doc.children(article).is_empty());
        assert_eq!(doc.text_content(article), "plain");
    }
}
