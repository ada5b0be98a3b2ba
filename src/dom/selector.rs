use std::{fmt, str::FromStr};

use cssparser::{ParserInput, ToCss};
use precomputed_hash::PrecomputedHash;
use selectors::{
    attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint},
    matching::{
        self, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext, MatchingMode,
        NeedsSelectorFlags, QuirksMode,
    },
    parser::{self, ParseRelative, SelectorList, SelectorParseErrorKind},
    OpaqueElement,
};
use thiserror::Error;

use super::tree::{Document, Element, NodeId};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid selector {selector:?} at line {line}, column {column}: {reason}")]
pub struct SelectorError {
    selector: String,
    line: u32,
    column: u32,
    reason: String,
}

/// Compiled CSS selector list matched against the arena document.
///
/// Pseudo-classes that depend on a live page (`:hover`, `:checked`, ...) are
/// rejected at parse time; structural ones such as `:not()` and `:first-child`
/// work.
#[derive(Debug, Clone)]
pub struct Selector {
    source: String,
    list: SelectorList<FeedSelectors>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let source = source.trim();
        let mut input = ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&FeedParser, &mut parser, ParseRelative::No).map_err(
            |err| SelectorError {
                selector: source.to_string(),
                line: err.location.line,
                column: err.location.column,
                reason: format!("{:?}", err.kind),
            },
        )?;
        Ok(Self {
            source: source.to_string(),
            list,
        })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = ElementRef::new(doc, node) else {
            return false;
        };
        let mut caches = Default::default();
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            &mut caches,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matching::matches_selector_list(&self.list, &element, &mut context)
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FeedSelectors;

impl parser::SelectorImpl for FeedSelectors {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssName;
    type LocalName = CssName;
    type NamespacePrefix = CssName;
    type NamespaceUrl = NoNamespace;
    type BorrowedNamespaceUrl = NoNamespace;
    type BorrowedLocalName = CssName;
    type NonTSPseudoClass = PseudoClass;
    type PseudoElement = PseudoElement;
}

struct FeedParser;

impl<'i> parser::Parser<'i> for FeedParser {
    type Impl = FeedSelectors;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CssString(String);

impl<'a> From<&'a str> for CssString {
    fn from(value: &'a str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_string(&self.0, dest)
    }
}

/// Tag names, ids and classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CssName(String);

impl<'a> From<&'a str> for CssName {
    fn from(value: &'a str) -> Self {
        Self(value.to_string())
    }
}

impl ToCss for CssName {
    fn to_css<W: fmt::Write>(&self, dest: &mut W) -> fmt::Result {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

impl PrecomputedHash for CssName {
    // FNV-1a; only feeds the ancestor bloom filter, which we never build.
    fn precomputed_hash(&self) -> u32 {
        self.0.bytes().fold(0x811c_9dc5, |hash: u32, byte| {
            (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
        })
    }
}

/// Host documents carry no namespaces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NoNamespace;

impl PrecomputedHash for NoNamespace {
    fn precomputed_hash(&self) -> u32 {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PseudoClass {}

impl parser::NonTSPseudoClass for PseudoClass {
    type Impl = FeedSelectors;

    fn is_active_or_hover(&self) -> bool {
        match *self {}
    }

    fn is_user_action_state(&self) -> bool {
        match *self {}
    }
}

impl ToCss for PseudoClass {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PseudoElement {}

impl parser::PseudoElement for PseudoElement {
    type Impl = FeedSelectors;
}

impl ToCss for PseudoElement {
    fn to_css<W: fmt::Write>(&self, _dest: &mut W) -> fmt::Result {
        match *self {}
    }
}

/// Borrowed view of one arena element for the matcher.
#[derive(Clone, Copy)]
struct ElementRef<'a> {
    doc: &'a Document,
    id: NodeId,
    element: &'a Element,
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.element.tag(), self.id)
    }
}

impl<'a> ElementRef<'a> {
    fn new(doc: &'a Document, id: NodeId) -> Option<Self> {
        doc.get(id).map(|element| Self { doc, id, element })
    }

    fn siblings(&self) -> (&'a [NodeId], Option<usize>) {
        let siblings = self
            .doc
            .parent(self.id)
            .map(|parent| self.doc.children(parent))
            .unwrap_or(&[]);
        let position = siblings.iter().position(|sibling| *sibling == self.id);
        (siblings, position)
    }
}

impl selectors::Element for ElementRef<'_> {
    type Impl = FeedSelectors;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.element)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc
            .parent(self.id)
            .and_then(|parent| ElementRef::new(self.doc, parent))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        let index = position?.checked_sub(1)?;
        ElementRef::new(self.doc, siblings[index])
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let (siblings, position) = self.siblings();
        let next = siblings.get(position? + 1)?;
        ElementRef::new(self.doc, *next)
    }

    fn first_element_child(&self) -> Option<Self> {
        let first = self.doc.children(self.id).first()?;
        ElementRef::new(self.doc, *first)
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &CssName) -> bool {
        self.element.tag().eq_ignore_ascii_case(&local_name.0)
    }

    fn has_namespace(&self, _ns: &NoNamespace) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.element.tag() == other.element.tag()
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&NoNamespace>,
        local_name: &CssName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        self.element
            .attr(&local_name.0)
            .map_or(false, |value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &PseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match *pc {}
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        false
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.element
            .attr("id")
            .map_or(false, |value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssName, case_sensitivity: CaseSensitivity) -> bool {
        self.element.attr("class").map_or(false, |classes| {
            classes
                .split_ascii_whitespace()
                .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
        })
    }

    fn imported_part(&self, _name: &CssName) -> Option<CssName> {
        None
    }

    fn is_part(&self, _name: &CssName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.id).is_empty() && self.doc.text_content(self.id).is_empty()
    }

    fn is_root(&self) -> bool {
        self.doc.parent(self.id).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeSpec;

    fn feed_doc() -> (Document, NodeId) {
        let mut doc = Document::new();
        let spec = NodeSpec::element("article")
            .attr("data-testid", "tweet")
            .child(
                NodeSpec::element("div")
                    .attr("data-testid", "tweetText")
                    .attr("class", "css-1 r-2")
                    .child(NodeSpec::element("span").text("안녕하세요")),
            )
            .child(NodeSpec::element("div").attr("data-testid", "tweetPhoto"));
        let article = doc.build(&spec);
        let root = doc.root();
        doc.append_child(root, article).unwrap();
        (doc, article)
    }

    #[test]
    fn descendant_attribute_selector_matches_nested_span() {
        let (doc, article) = feed_doc();
        let selector = Selector::parse(r#"div[data-testid="tweetText"] span"#).unwrap();
        let spans = doc.query_selector_all(article, &selector);
        assert_eq!(spans.len(), 1);
        assert_eq!(doc.get(spans[0]).unwrap().tag(), "span");
    }

    #[test]
    fn attribute_presence_and_classes() {
        let (doc, article) = feed_doc();
        let by_class = Selector::parse("div.r-2.css-1").unwrap();
        assert_eq!(doc.query_selector_all(doc.root(), &by_class).len(), 1);
        let presence = Selector::parse("[data-testid]").unwrap();
        assert!(presence.matches(&doc, article));
        let missing = Selector::parse("div.r-3").unwrap();
        assert!(doc.query_selector(doc.root(), &missing).is_none());
    }

    #[test]
    fn child_prefix_and_negation_selectors() {
        let (doc, article) = feed_doc();
        let child = Selector::parse(r#"div[data-testid="tweetText"] > span"#).unwrap();
        assert_eq!(doc.query_selector_all(article, &child).len(), 1);
        let not_direct = Selector::parse(r#"article > span"#).unwrap();
        assert!(doc.query_selector(article, &not_direct).is_none());

        let prefix = Selector::parse(r#"[data-testid^="tweet"]"#).unwrap();
        assert_eq!(doc.query_selector_all(doc.root(), &prefix).len(), 3);

        let promoted = Selector::parse(r#"article:not([data-promoted])"#).unwrap();
        assert!(promoted.matches(&doc, article));
        let first = Selector::parse("article > div:first-child").unwrap();
        assert_eq!(doc.query_selector_all(article, &first).len(), 1);
    }

    #[test]
    fn comma_list_matches_either_alternative() {
        let (doc, _) = feed_doc();
        let selector = Selector::parse("span, article").unwrap();
        assert_eq!(doc.query_selector_all(doc.root(), &selector).len(), 2);
    }

    #[test]
    fn ancestor_outside_scope_still_counts() {
        let (doc, article) = feed_doc();
        let text_region = doc.children(article)[0];
        let selector = Selector::parse("article span").unwrap();
        assert_eq!(doc.query_selector_all(text_region, &selector).len(), 1);
    }

    #[test]
    fn parses_through_from_str_and_keeps_source() {
        let selector: Selector = "  article.post  ".parse().unwrap();
        assert_eq!(selector.to_string(), "article.post");
    }

    #[test]
    fn rejects_malformed_and_page_state_selectors() {
        assert!(Selector::parse("  ").is_err());
        assert!(Selector::parse(r#"div[data-testid="x""#).is_err());
        assert!(Selector::parse("div >").is_err());
        assert!(Selector::parse("div.").is_err());
        let err = Selector::parse("span:hover").unwrap_err();
        assert_eq!(err.line, 0);
        assert!(err.to_string().contains("span:hover"));
    }
}
