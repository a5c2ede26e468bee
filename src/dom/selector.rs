use std::fmt;

use scraper::selector::{CssLocalName, CssString, NonTSPseudoClass, Parser, PseudoElement, Simple};
use selectors::{
    attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint},
    bloom::BloomFilter,
    matching,
    parser::{ParseRelative, SelectorImpl, SelectorList},
    Element, OpaqueElement,
};

use super::document::{Document, NodeId};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

type Namespace = <Simple as SelectorImpl>::NamespaceUrl;

/// A parsed CSS selector list, matched against arena nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    list: SelectorList<Simple>,
}

impl Selector {
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        let mut input = cssparser::ParserInput::new(source);
        let mut parser = cssparser::Parser::new(&mut input);
        let list = SelectorList::parse(&Parser, &mut parser, ParseRelative::No).ok()?;
        Some(Self {
            source: source.to_string(),
            list,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        let mut caches = matching::SelectorCaches::default();
        let mut context = matching::MatchingContext::new(
            matching::MatchingMode::Normal,
            None,
            &mut caches,
            matching::QuirksMode::NoQuirks,
            matching::NeedsSelectorFlags::No,
            matching::MatchingForInvalidation::No,
        );
        matching::matches_selector_list(&self.list, &ArenaElement { doc, node }, &mut context)
    }
}

/// Element view handed to the matcher; only ever wraps element nodes.
#[derive(Clone, Copy)]
struct ArenaElement<'a> {
    doc: &'a Document,
    node: NodeId,
}

impl fmt::Debug for ArenaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaElement")
            .field("node", &self.node)
            .field("tag", &self.doc.tag(self.node))
            .finish()
    }
}

impl<'a> ArenaElement<'a> {
    fn wrap(&self, node: NodeId) -> Option<Self> {
        self.doc.is_element(node).then_some(Self {
            doc: self.doc,
            node,
        })
    }

    fn siblings(&self) -> &'a [NodeId] {
        match self.doc.parent(self.node) {
            Some(parent) => self.doc.children(parent),
            None => &[],
        }
    }

    fn position(&self) -> Option<usize> {
        self.siblings().iter().position(|sibling| *sibling == self.node)
    }
}

impl Element for ArenaElement<'_> {
    type Impl = Simple;

    fn opaque(&self) -> OpaqueElement {
        self.doc.opaque(self.node)
    }

    fn parent_element(&self) -> Option<Self> {
        self.doc.parent(self.node).and_then(|parent| self.wrap(parent))
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
        let index = self.position()?;
        self.siblings()[..index]
            .iter()
            .rev()
            .find_map(|sibling| self.wrap(*sibling))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        let index = self.position()?;
        self.siblings()[index + 1..]
            .iter()
            .find_map(|sibling| self.wrap(*sibling))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.doc
            .children(self.node)
            .iter()
            .find_map(|child| self.wrap(*child))
    }

    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, name: &CssLocalName) -> bool {
        self.doc
            .tag(self.node)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(&name.0))
    }

    fn has_namespace(&self, namespace: &Namespace) -> bool {
        &**namespace == HTML_NAMESPACE
    }

    fn is_same_type(&self, other: &Self) -> bool {
        match (self.doc.tag(self.node), other.doc.tag(other.node)) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => false,
        }
    }

    fn attr_matches(
        &self,
        ns: &NamespaceConstraint<&Namespace>,
        local_name: &CssLocalName,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        if matches!(*ns, NamespaceConstraint::Specific(url) if !url.is_empty()) {
            return false;
        }
        self.doc
            .attribute(self.node, &local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        _pc: &NonTSPseudoClass,
        _context: &mut matching::MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn match_pseudo_element(
        &self,
        _pe: &PseudoElement,
        _context: &mut matching::MatchingContext<'_, Self::Impl>,
    ) -> bool {
        false
    }

    fn apply_selector_flags(&self, _flags: matching::ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        matches!(self.doc.tag(self.node), Some("a" | "area"))
            && self.doc.attribute(self.node, "href").is_some()
    }

    fn is_html_slot_element(&self) -> bool {
        false
    }

    fn has_id(&self, id: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .id(self.node)
            .is_some_and(|value| case_sensitivity.eq(id.0.as_bytes(), value.as_bytes()))
    }

    fn has_class(&self, name: &CssLocalName, case_sensitivity: CaseSensitivity) -> bool {
        self.doc
            .classes(self.node)
            .iter()
            .any(|class| case_sensitivity.eq(name.0.as_bytes(), class.as_bytes()))
    }

    fn has_custom_state(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn imported_part(&self, _name: &CssLocalName) -> Option<CssLocalName> {
        None
    }

    fn is_part(&self, _name: &CssLocalName) -> bool {
        false
    }

    fn is_empty(&self) -> bool {
        self.doc.children(self.node).is_empty()
    }

    fn is_root(&self) -> bool {
        self.node == self.doc.root()
    }

    fn add_element_unique_hashes(&self, _filter: &mut BloomFilter) -> bool {
        false
    }
}
