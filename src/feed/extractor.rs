use chrono::Utc;

use crate::{
    domain::PostNode,
    dom::{Document, NodeId, Selector},
};

#[derive(Debug, Clone)]
pub struct TextExtractor {
    container: Selector,
}

impl TextExtractor {
    pub fn new(container: Selector) -> Self {
        Self { container }
    }

    /// `None` when the node has no text or sits outside any post container.
    pub fn extract(&self, doc: &Document, node: NodeId) -> Option<PostNode> {
        let text = doc.text_content(node);
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let container = doc.closest(node, &self.container)?;
        Some(PostNode {
            node,
            container,
            text: text.to_string(),
            discovered_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeSpec;

    fn extractor() -> TextExtractor {
        TextExtractor::new(Selector::parse(r#"[data-testid="tweet"]"#).unwrap())
    }

    fn span_in(doc: &mut Document, container_attr: Option<&str>, text: &str) -> NodeId {
        let mut outer = NodeSpec::element("article");
        if let Some(testid) = container_attr {
            outer = outer.attr("data-testid", testid);
        }
        let outer = outer.child(NodeSpec::element("div").child(NodeSpec::element("span").text(text)));
        let article = doc.build(&outer);
        let root = doc.root();
        doc.append_child(root, article).unwrap();
        doc.descendants(article)[1]
    }

    #[test]
    fn trims_text_and_resolves_container() {
        let mut doc = Document::new();
        let span = span_in(&mut doc, Some("tweet"), "  안녕하세요 \n");
        let post = extractor().extract(&doc, span).unwrap();
        assert_eq!(post.text, "안녕하세요");
        assert_eq!(post.node, span);
        assert_eq!(doc.get(post.container).unwrap().tag(), "article");
    }

    #[test]
    fn whitespace_only_text_is_a_miss() {
        let mut doc = Document::new();
        let span = span_in(&mut doc, Some("tweet"), "   ");
        assert!(extractor().extract(&doc, span).is_none());
    }

    #[test]
    fn missing_container_is_a_miss() {
        let mut doc = Document::new();
        let span = span_in(&mut doc, Some("cellInnerDiv"), "본문");
        assert!(extractor().extract(&doc, span).is_none());
        let bare = span_in(&mut doc, None, "본문");
        assert!(extractor().extract(&doc, bare).is_none());
    }
}
