//! Above-the-fold critical selectors.
//!
//! Markup is scanned for a bounded number of lines after `<body>`, and every
//! element found there contributes its tag, classes and id to an allow-list.
//! In critical mode a selector survives only when each of its compounds is
//! an allow-list entry or describes one of the fold elements.

use crate::classifier::ReferenceMatcher;
use crate::selector::{
    compound_tokens, escape_ident, normalize_attribute, split_compounds, SelectorToken, TokenKind,
};
use crate::usage::{parse_tag_attributes, OPEN_TAG};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Selectors that are always critical
pub const DEFAULT_SEED_SELECTORS: &[&str] = &[
    "html",
    "body",
    "head",
    "title",
    "header",
    "nav",
    "main",
    "footer",
    ".hero",
    ".above-fold",
    ".critical",
    "[data-critical]",
];

pub const DEFAULT_LINE_WINDOW: usize = 50;
pub const DEFAULT_MAX_SELECTORS: usize = 500;

const STATE_PSEUDOS: [&str; 3] = [":hover", ":focus", ":active"];

/// Tags that never render above the fold
const INVISIBLE_TAGS: &[&str] = &["script", "style", "link", "meta", "noscript", "template"];

/// An element found in the above-the-fold window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldElement {
    pub tag: String,
    pub classes: Vec<String>,
    pub id: Option<String>,
    /// Normalized attribute selectors the element satisfies, `[name]` and
    /// `[name=value]`
    #[serde(default)]
    pub attributes: Vec<String>,
    /// 1-based line in the markup
    pub line: usize,
}

impl FoldElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            classes: Vec::new(),
            id: None,
            attributes: Vec::new(),
            line: 0,
        }
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: Option<&str>) -> Self {
        self.push_attribute(name, value);
        self
    }

    fn push_attribute(&mut self, name: &str, value: Option<&str>) {
        let name = name.to_ascii_lowercase();
        self.attributes.push(format!("[{}]", name));
        if let Some(value) = value {
            self.attributes.push(normalize_attribute(&format!("[{}={}]", name, value)));
        }
    }
}

/// Collect elements opened within `window` lines of the `<body>` tag.
///
/// Without a body tag the window starts at the first line, so fragments and
/// component templates still work.
pub fn scan_above_the_fold(html: &str, window: usize) -> Vec<FoldElement> {
    let lower = html.to_ascii_lowercase();
    let body_offset = lower.find("<body").unwrap_or(0);
    let first_line = html[..body_offset].matches('\n').count() + 1;
    let last_line = first_line + window;

    let mut elements = Vec::new();
    let mut line = first_line;
    let mut counted_to = body_offset;

    for caps in OPEN_TAG.captures_iter(&html[body_offset..]) {
        let Some(whole) = caps.get(0) else { continue };
        let start = body_offset + whole.start();
        line += html[counted_to..start].matches('\n').count();
        counted_to = start;
        if line > last_line {
            break;
        }

        let tag = caps[1].to_ascii_lowercase();
        if INVISIBLE_TAGS.contains(&tag.as_str()) {
            continue;
        }

        let mut element = FoldElement::new(tag);
        element.line = line;
        let attributes = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        for (name, value) in parse_tag_attributes(attributes) {
            element.push_attribute(&name, value.as_deref());
            let Some(value) = value else { continue };
            match name.to_ascii_lowercase().as_str() {
                "class" | "classname" => {
                    element.classes.extend(value.split_whitespace().map(str::to_string))
                }
                "id" if !value.trim().is_empty() => element.id = Some(value.trim().to_string()),
                _ => {}
            }
        }
        elements.push(element);
    }

    elements
}

/// What one compound selector requires of an element, or what one element
/// offers. Pseudo-classes and pseudo-elements are not part of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Signature {
    tag: Option<String>,
    ids: BTreeSet<String>,
    classes: BTreeSet<String>,
    attributes: BTreeSet<String>,
}

impl Signature {
    fn of_compound(compound: &str) -> Self {
        Self::from_tokens(compound_tokens(compound))
    }

    fn from_tokens(tokens: Vec<SelectorToken>) -> Self {
        let mut signature = Self::default();
        for token in tokens {
            match token.kind {
                TokenKind::Tag => signature.tag = Some(token.value),
                TokenKind::Id => {
                    signature.ids.insert(token.value);
                }
                TokenKind::Class => {
                    signature.classes.insert(token.value);
                }
                TokenKind::Attribute => {
                    signature.attributes.insert(token.value);
                }
                TokenKind::Pseudo => {}
            }
        }
        signature
    }

    fn of_element(element: &FoldElement) -> Self {
        Self {
            tag: Some(element.tag.to_ascii_lowercase()),
            ids: element.id.iter().cloned().collect(),
            classes: element.classes.iter().cloned().collect(),
            attributes: element.attributes.iter().cloned().collect(),
        }
    }

    /// `*`, `:root` and bare pseudo compounds place no demand on the element
    fn is_unconstrained(&self) -> bool {
        self.tag.is_none() && self.ids.is_empty() && self.classes.is_empty() && self.attributes.is_empty()
    }

    /// Would an element with signature `element` match this compound?
    fn matched_by(&self, element: &Signature) -> bool {
        self.tag.as_ref().map_or(true, |tag| element.tag.as_ref() == Some(tag))
            && self.ids.is_subset(&element.ids)
            && self.classes.is_subset(&element.classes)
            && self.attributes.is_subset(&element.attributes)
    }
}

/// Ordered, capped set of critical selectors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CriticalAllowList {
    selectors: IndexSet<String>,
    /// Single-compound entries, matched exactly
    entries: HashSet<Signature>,
    /// Fold elements whose selectors all fit under the cap
    elements: Vec<Signature>,
    /// True when the cap stopped the allow-list from growing
    pub truncated: bool,
}

impl CriticalAllowList {
    pub fn contains(&self, selector: &str) -> bool {
        self.selectors.contains(selector)
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.selectors.iter().map(String::as_str)
    }

    /// Is `selector` needed to render the fold?
    ///
    /// True when it is an allow-list entry verbatim, or when every compound
    /// either equals a single-compound entry or is matched by a fold
    /// element. `header.hero` is therefore not critical just because
    /// `header` and `.hero` both are, and `body .modal` needs `.modal`
    /// above the fold.
    pub fn is_critical(&self, selector: &str) -> bool {
        let selector = selector.trim();
        if self.selectors.contains(selector) {
            return true;
        }
        let compounds = split_compounds(selector);
        !compounds.is_empty() && compounds.iter().all(|compound| self.compound_is_critical(compound))
    }

    fn compound_is_critical(&self, compound: &str) -> bool {
        let signature = Signature::of_compound(compound);
        signature.is_unconstrained()
            || self.entries.contains(&signature)
            || self.elements.iter().any(|element| signature.matched_by(element))
    }

    fn insert(&mut self, selector: String, cap: usize) {
        if self.selectors.contains(&selector) {
            return;
        }
        if self.selectors.len() >= cap {
            self.truncated = true;
            return;
        }
        if let [compound] = split_compounds(&selector).as_slice() {
            let signature = Signature::of_compound(compound);
            if !signature.is_unconstrained() {
                self.entries.insert(signature);
            }
        }
        self.selectors.insert(selector);
    }
}

impl ReferenceMatcher for CriticalAllowList {
    fn matches(&self, selector: &str, _tokens: &[SelectorToken]) -> bool {
        self.is_critical(selector)
    }
}

/// Builds the critical allow-list from seeds and fold elements
#[derive(Debug, Clone)]
pub struct CriticalSelectorGenerator {
    seeds: Vec<String>,
    max_selectors: usize,
}

impl Default for CriticalSelectorGenerator {
    fn default() -> Self {
        Self::new(
            DEFAULT_SEED_SELECTORS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_MAX_SELECTORS,
        )
    }
}

impl CriticalSelectorGenerator {
    pub fn new(seeds: Vec<String>, max_selectors: usize) -> Self {
        Self { seeds, max_selectors }
    }

    pub fn generate(&self, elements: &[FoldElement]) -> CriticalAllowList {
        let cap = self.max_selectors;
        let mut list = CriticalAllowList::default();

        for seed in &self.seeds {
            let seed = seed.trim();
            if !seed.is_empty() {
                list.insert(seed.to_string(), cap);
            }
        }

        for element in elements {
            let tag = element.tag.to_ascii_lowercase();
            let id = element.id.as_deref().map(escape_ident);
            let classes: Vec<String> = element.classes.iter().map(|c| escape_ident(c)).collect();

            list.insert(tag.clone(), cap);
            for class in &classes {
                list.insert(format!(".{}", class), cap);
            }
            if let Some(id) = &id {
                list.insert(format!("#{}", id), cap);
            }
            // Compounds only for classes this element actually carries.
            for class in &classes {
                list.insert(format!("{}.{}", tag, class), cap);
                if let Some(id) = &id {
                    list.insert(format!("#{}.{}", id, class), cap);
                }
            }
            if !list.truncated {
                list.elements.push(Signature::of_element(element));
            }
        }

        let base: Vec<String> = list
            .selectors
            .iter()
            .filter(|s| !has_pseudo(s))
            .cloned()
            .collect();
        'states: for selector in base {
            for state in STATE_PSEUDOS {
                if list.len() >= cap {
                    list.truncated = true;
                    break 'states;
                }
                list.insert(format!("{}{}", selector, state), cap);
            }
        }

        list
    }
}

fn has_pseudo(selector: &str) -> bool {
    split_compounds(selector)
        .iter()
        .flat_map(|compound| compound_tokens(compound))
        .any(|token| token.kind == TokenKind::Pseudo)
}
