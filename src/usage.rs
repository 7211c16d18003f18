//! Usage extraction.
//!
//! Scans project source documents (markup, templates, scripts) and collects
//! the identifiers CSS selectors could be matched against. Extraction never
//! fails and always prefers capturing too much over too little: a spurious
//! token only keeps a little extra CSS, a missing one deletes styles.

use crate::selector::{self, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Tokens referenced by a project's source documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageSet {
    pub classes: BTreeSet<String>,
    pub ids: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub attributes: BTreeSet<String>,
    /// Utility classes and component selectors (Tailwind, Angular)
    pub utilities: BTreeSet<String>,
    pub raw_tokens: BTreeSet<String>,
}

impl UsageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a usage set holding only the given classes
    pub fn with_classes<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            classes: classes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Set union, in place
    pub fn merge(&mut self, other: UsageSet) {
        self.classes.extend(other.classes);
        self.ids.extend(other.ids);
        self.tags.extend(other.tags);
        self.attributes.extend(other.attributes);
        self.utilities.extend(other.utilities);
        self.raw_tokens.extend(other.raw_tokens);
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of tokens across all categories
    pub fn len(&self) -> usize {
        self.classes.len()
            + self.ids.len()
            + self.tags.len()
            + self.attributes.len()
            + self.utilities.len()
            + self.raw_tokens.len()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class) || self.utilities.contains(class)
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag) || self.utilities.contains(tag)
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }

    pub fn has_raw(&self, token: &str) -> bool {
        self.raw_tokens.contains(token)
    }
}

/// Framework flavour of a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Generic,
    Jsx,
    Vue,
    Angular,
    Tailwind,
}

impl SourceKind {
    /// Guess the kind of a document from its path and content.
    ///
    /// Tailwind is never guessed: routing tokens into utilities is opt-in.
    pub fn detect(path: &str, content: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase());
        match extension.as_deref() {
            Some("jsx") | Some("tsx") => SourceKind::Jsx,
            Some("vue") => SourceKind::Vue,
            _ if content.contains("@Component(") => SourceKind::Angular,
            _ => SourceKind::Generic,
        }
    }

    /// Parse a kind name; `auto` (or anything unknown) yields `None`
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "generic" | "html" => Some(SourceKind::Generic),
            "jsx" | "react" => Some(SourceKind::Jsx),
            "vue" => Some(SourceKind::Vue),
            "angular" => Some(SourceKind::Angular),
            "tailwind" => Some(SourceKind::Tailwind),
            _ => None,
        }
    }
}

/// One project source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: String,
    pub content: String,
    /// `None` means auto-detect
    pub kind: Option<SourceKind>,
}

impl SourceDocument {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// The explicit kind, or the detected one
    pub fn resolved_kind(&self) -> SourceKind {
        self.kind
            .unwrap_or_else(|| SourceKind::detect(&self.path, &self.content))
    }
}

/// Bare tag names recognised in markup
const KNOWN_TAGS: &[&str] = &[
    "html", "head", "body", "title", "meta", "link", "header", "nav", "main", "footer", "section",
    "article", "aside", "div", "span", "p", "a", "ul", "ol", "li", "dl", "dt", "dd", "h1", "h2",
    "h3", "h4", "h5", "h6", "img", "picture", "figure", "figcaption", "button", "input",
    "textarea", "select", "option", "label", "form", "fieldset", "legend", "table", "thead",
    "tbody", "tfoot", "tr", "th", "td", "caption", "strong", "em", "b", "i", "u", "small", "code",
    "pre", "blockquote", "hr", "br", "video", "audio", "source", "canvas", "svg", "path",
    "iframe", "details", "summary", "dialog", "template", "slot", "abbr", "address", "time",
    "mark", "sup", "sub", "progress", "meter", "output",
];

static CLASS_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^:\w.-])(?:class|className)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("class attribute regex")
});

static CLASS_EXPR_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^:\w.-])className\s*=\s*\{").expect("className regex"));

static ID_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:^|[^:\w.-])id\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("id attribute regex")
});

static ATTR_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[\s*[A-Za-z_][-\w:.]*\s*(?:[~|^$*]?=\s*(?:"[^"]*"|'[^']*'|[^\]\s"']+)\s*)?\]"#)
        .expect("attribute selector regex")
});

pub(crate) static OPEN_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)((?:\s[^<>]*)?)/?>").expect("open tag regex")
});

static TAG_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_@:][-\w:.@]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("tag attribute regex")
});

static PSEUDO_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w:])(::?[a-z][a-z-]*)").expect("pseudo regex"));

static STRING_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""((?:[^"\\\n]|\\.)*)"|'((?:[^'\\\n]|\\.)*)'|`([^`]*)`"#).expect("string regex")
});

static TEMPLATE_EXPR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{[^}]*\}").expect("template expression regex"));

static DYNAMIC_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:v-bind)?:class\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("dynamic class regex")
});

static NG_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[ngClass\]\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("ngClass regex")
});

static OBJECT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_][\w-]*)\s*:").expect("object key regex"));

static CLASS_BINDING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[class\.([\w-]+)\]").expect("class binding regex"));

static ANGULAR_SELECTOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"selector\s*:\s*(?:'([^']*)'|"([^"]*)"|`([^`]*)`)"#)
        .expect("angular selector regex")
});

static TAILWIND_UTILITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9:-]*$").expect("tailwind utility regex"));

/// Extract usage from every document and union the results
pub fn extract_usage(documents: &[SourceDocument]) -> UsageSet {
    let mut usage = UsageSet::new();
    for document in documents {
        usage.merge(extract_document(document));
    }
    usage
}

/// Extract usage from documents in parallel
pub fn extract_usage_parallel(documents: &[SourceDocument]) -> UsageSet {
    use rayon::prelude::*;

    documents
        .par_iter()
        .map(extract_document)
        .reduce(UsageSet::new, |mut acc, usage| {
            acc.merge(usage);
            acc
        })
}

/// Extract usage from one document according to its kind
pub fn extract_document(document: &SourceDocument) -> UsageSet {
    let content = document.content.as_str();
    let mut usage = UsageSet::new();
    let mut class_tokens = Vec::new();

    scan_markup(content, &mut usage, &mut class_tokens);

    match document.resolved_kind() {
        SourceKind::Generic => {
            // Plain scripts may still build JSX-style class expressions.
            scan_class_expressions(content, &mut class_tokens);
        }
        SourceKind::Jsx => scan_class_expressions(content, &mut class_tokens),
        SourceKind::Vue => scan_dynamic_bindings(content, &DYNAMIC_CLASS, &mut class_tokens),
        SourceKind::Angular => scan_angular(content, &mut usage, &mut class_tokens),
        SourceKind::Tailwind => {
            scan_class_expressions(content, &mut class_tokens);
            for literal in string_literals(content) {
                for token in literal.split_whitespace() {
                    if TAILWIND_UTILITY.is_match(token) {
                        usage.utilities.insert(token.to_string());
                    } else {
                        usage.classes.insert(token.to_string());
                    }
                }
            }
            for token in class_tokens.drain(..) {
                if TAILWIND_UTILITY.is_match(&token) {
                    usage.utilities.insert(token);
                } else {
                    usage.classes.insert(token);
                }
            }
        }
    }

    usage.classes.extend(class_tokens);
    usage
}

/// Static attribute scanning shared by every kind
fn scan_markup(content: &str, usage: &mut UsageSet, class_tokens: &mut Vec<String>) {
    for caps in CLASS_ATTR.captures_iter(content) {
        if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
            class_tokens.extend(value.as_str().split_whitespace().map(str::to_string));
        }
    }

    for caps in ID_ATTR.captures_iter(content) {
        if let Some(value) = caps.get(1).or_else(|| caps.get(2)) {
            let id = value.as_str().trim();
            if !id.is_empty() && !id.contains(char::is_whitespace) {
                usage.ids.insert(id.to_string());
            }
        }
    }

    for found in ATTR_SELECTOR.find_iter(content) {
        usage
            .attributes
            .insert(selector::normalize_attribute(found.as_str()));
    }

    for caps in OPEN_TAG.captures_iter(content) {
        let tag = caps[1].to_ascii_lowercase();
        if KNOWN_TAGS.contains(&tag.as_str()) || tag.contains('-') {
            usage.tags.insert(tag);
        }
        if let Some(attributes) = caps.get(2) {
            for (name, value) in parse_tag_attributes(attributes.as_str()) {
                usage.attributes.insert(format!("[{}]", name));
                if let Some(value) = value {
                    usage
                        .attributes
                        .insert(selector::normalize_attribute(&format!("[{}={}]", name, value)));
                }
            }
        }
    }

    for caps in PSEUDO_TOKEN.captures_iter(content) {
        usage.raw_tokens.insert(caps[1].to_string());
    }
}

/// Parse the attribute list of an opening tag into `(name, value)` pairs
pub(crate) fn parse_tag_attributes(text: &str) -> Vec<(String, Option<String>)> {
    TAG_ATTRIBUTE
        .captures_iter(text)
        .map(|caps| {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string());
            (caps[1].to_string(), value)
        })
        .collect()
}

/// `className={...}`: only string literals inside the braces are discoverable
fn scan_class_expressions(content: &str, class_tokens: &mut Vec<String>) {
    for found in CLASS_EXPR_START.find_iter(content) {
        let open = found.end() - 1;
        let end = matching_brace(content, open);
        for literal in string_literals(&content[open..end]) {
            class_tokens.extend(literal.split_whitespace().map(str::to_string));
        }
    }
}

/// Dynamic bindings (`:class`, `[ngClass]`): string literals and object keys
/// are captured as class names without evaluating anything.
fn scan_dynamic_bindings(content: &str, binding: &Regex, class_tokens: &mut Vec<String>) {
    for caps in binding.captures_iter(content) {
        let Some(value) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        let value = value.as_str();
        for literal in string_literals(value) {
            class_tokens.extend(literal.split_whitespace().map(str::to_string));
        }
        for key in OBJECT_KEY.captures_iter(value) {
            class_tokens.push(key[1].to_string());
        }
    }
}

fn scan_angular(content: &str, usage: &mut UsageSet, class_tokens: &mut Vec<String>) {
    for caps in ANGULAR_SELECTOR.captures_iter(content) {
        let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        for alternative in selector::split_selector_list(value.as_str()) {
            for token in selector::decompose(&alternative) {
                match token.kind {
                    TokenKind::Tag => {
                        usage.utilities.insert(token.value);
                    }
                    TokenKind::Class => class_tokens.push(token.value),
                    TokenKind::Id => {
                        usage.ids.insert(token.value);
                    }
                    TokenKind::Attribute => {
                        usage.attributes.insert(token.value);
                    }
                    TokenKind::Pseudo => {}
                }
            }
        }
    }

    for caps in CLASS_BINDING.captures_iter(content) {
        class_tokens.push(caps[1].to_string());
    }

    scan_dynamic_bindings(content, &NG_CLASS, class_tokens);
    scan_class_expressions(content, class_tokens);
}

/// Contents of every quoted string literal; template literal interpolations
/// are blanked out.
fn string_literals(text: &str) -> Vec<String> {
    STRING_LITERAL
        .captures_iter(text)
        .filter_map(|caps| {
            if let Some(template) = caps.get(3) {
                return Some(TEMPLATE_EXPR.replace_all(template.as_str(), " ").into_owned());
            }
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Byte index just past the brace matching the `{` at `open`, or the text
/// length when unbalanced.
fn matching_brace(text: &str, open: usize) -> usize {
    let mut depth = 0usize;
    for (offset, c) in text[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return open + offset + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}
