//! Rule segmentation.
//!
//! Splits raw CSS into an ordered list of [`Block`]s with a small state
//! machine and a brace-depth counter. Nested rules inside `@media`,
//! `@supports` or `@keyframes` stay inside their parent's `body`. The scanner
//! never fails: unbalanced input produces a `malformed` block instead.

use serde::{Deserialize, Serialize};

/// Kind of at-rule a block represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AtRuleType {
    None,
    Media,
    Supports,
    Keyframes,
    FontFace,
    Other,
}

impl AtRuleType {
    /// Classify the keyword that follows `@`. Vendor prefixes are ignored, so
    /// `-webkit-keyframes` is a keyframes rule.
    pub fn from_keyword(keyword: &str) -> Self {
        let lower = keyword.to_ascii_lowercase();
        let unprefixed = ["-webkit-", "-moz-", "-ms-", "-o-"]
            .iter()
            .find_map(|p| lower.strip_prefix(p))
            .unwrap_or(&lower);
        match unprefixed {
            "media" => AtRuleType::Media,
            "supports" => AtRuleType::Supports,
            "keyframes" => AtRuleType::Keyframes,
            "font-face" => AtRuleType::FontFace,
            _ => AtRuleType::Other,
        }
    }
}

/// How comments are handled while segmenting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
    /// Top-level comments become non-rule blocks
    #[default]
    Preserve,
    /// Comments are removed everywhere
    Strip,
}

/// Segmenter options
#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentOptions {
    pub comments: CommentMode,
}

/// One segmented CSS rule, at-rule or passthrough fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Comma-joined selector group; empty for at-rules and passthrough text
    pub selectors_text: String,

    /// At-rule keyword without the `@` (`media`, `-webkit-keyframes`)
    pub keyword: String,

    /// At-rule prelude after the keyword (`screen and (max-width: 480px)`)
    pub prelude: String,

    /// Raw body including the outer braces. For non-rule blocks this is the
    /// whole fragment.
    pub body: String,

    pub at_rule: AtRuleType,
    pub source_order: usize,
    pub is_non_rule: bool,
    pub malformed: bool,
}

impl Block {
    /// Header text in front of the body (`.a, .b` or `@media screen`)
    pub fn header(&self) -> String {
        if self.is_non_rule {
            return String::new();
        }
        if self.at_rule == AtRuleType::None {
            return self.selectors_text.clone();
        }
        if self.prelude.is_empty() {
            format!("@{}", self.keyword)
        } else {
            format!("@{} {}", self.keyword, self.prelude)
        }
    }

    /// Inner text of the body with the outermost braces removed
    pub fn inner_body(&self) -> &str {
        let inner = self.body.strip_prefix('{').unwrap_or(&self.body);
        inner.strip_suffix('}').unwrap_or(inner)
    }

    /// Re-serialize this block
    pub fn to_css(&self) -> String {
        if self.is_non_rule {
            self.body.clone()
        } else {
            format!("{} {}", self.header(), self.body)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InPrelude,
    InBody,
}

/// Segment CSS text into blocks.
///
/// Every non-whitespace character of the input ends up in exactly one block,
/// except comments when [`CommentMode::Strip`] is selected.
pub fn segment(css: &str, options: &SegmentOptions) -> Vec<Block> {
    let mut segmenter = Segmenter {
        css,
        options: *options,
        blocks: Vec::new(),
    };
    segmenter.run();
    segmenter.blocks
}

/// Join blocks back into CSS text, one block per line
pub fn render(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        out.push_str(&block.to_css());
        out.push('\n');
    }
    out
}

struct Segmenter<'a> {
    css: &'a str,
    options: SegmentOptions,
    blocks: Vec<Block>,
}

impl<'a> Segmenter<'a> {
    fn run(&mut self) {
        // All structural characters are ASCII, so byte offsets always land on
        // char boundaries.
        let css = self.css;
        let bytes = css.as_bytes();
        let mut state = ScanState::Outside;
        let mut depth = 0usize;
        let mut paren_depth = 0usize;
        let mut start = 0usize;
        let mut body_start = 0usize;
        let mut i = 0usize;

        while i < bytes.len() {
            let b = bytes[i];

            if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                let end = comment_end(bytes, i);
                if state == ScanState::Outside {
                    if self.options.comments == CommentMode::Preserve {
                        let terminated = css[i..end].len() >= 4 && css[..end].ends_with("*/");
                        self.push_fragment(&css[i..end], !terminated);
                    }
                }
                i = end;
                continue;
            }

            match state {
                ScanState::Outside => {
                    if b.is_ascii_whitespace() {
                        i += 1;
                    } else if b == b'}' {
                        self.push_fragment("}", true);
                        i += 1;
                    } else {
                        state = ScanState::InPrelude;
                        start = i;
                        paren_depth = 0;
                    }
                }
                ScanState::InPrelude => match b {
                    b'"' | b'\'' => i = string_end(bytes, i),
                    b'(' | b'[' => {
                        paren_depth += 1;
                        i += 1;
                    }
                    b')' | b']' => {
                        paren_depth = paren_depth.saturating_sub(1);
                        i += 1;
                    }
                    b'{' => {
                        state = ScanState::InBody;
                        depth = 1;
                        body_start = i;
                        i += 1;
                    }
                    b';' if paren_depth == 0 => {
                        self.push_statement(&css[start..=i]);
                        state = ScanState::Outside;
                        i += 1;
                    }
                    b'}' => {
                        self.push_fragment(&css[start..=i], true);
                        state = ScanState::Outside;
                        i += 1;
                    }
                    _ => i += 1,
                },
                ScanState::InBody => match b {
                    b'"' | b'\'' => i = string_end(bytes, i),
                    b'{' => {
                        depth += 1;
                        i += 1;
                    }
                    b'}' => {
                        depth -= 1;
                        i += 1;
                        if depth == 0 {
                            self.push_rule(&css[start..body_start], &css[body_start..i], false);
                            state = ScanState::Outside;
                        }
                    }
                    _ => i += 1,
                },
            }
        }

        match state {
            ScanState::Outside => {}
            ScanState::InPrelude => {
                self.push_statement(&css[start..]);
            }
            ScanState::InBody => {
                self.push_rule(&css[start..body_start], css[body_start..].trim_end(), true);
            }
        }
    }

    fn next_order(&self) -> usize {
        self.blocks.len()
    }

    fn push_fragment(&mut self, text: &str, malformed: bool) {
        let block = Block {
            selectors_text: String::new(),
            keyword: String::new(),
            prelude: String::new(),
            body: text.trim().to_string(),
            at_rule: AtRuleType::None,
            source_order: self.next_order(),
            is_non_rule: true,
            malformed,
        };
        self.blocks.push(block);
    }

    /// A `;`-terminated statement at depth 0 (`@import`, `@charset`, stray
    /// declarations).
    fn push_statement(&mut self, text: &str) {
        let text = self.clean(text);
        let header = text.trim();
        let (keyword, prelude, at_rule) = match header.strip_prefix('@') {
            Some(rest) => {
                let (keyword, prelude) = split_keyword(rest.trim_end_matches(';'));
                let kind = AtRuleType::from_keyword(&keyword);
                (keyword, prelude, kind)
            }
            None => (String::new(), String::new(), AtRuleType::None),
        };
        let block = Block {
            selectors_text: String::new(),
            keyword,
            prelude,
            body: header.to_string(),
            at_rule,
            source_order: self.next_order(),
            is_non_rule: true,
            malformed: false,
        };
        self.blocks.push(block);
    }

    fn push_rule(&mut self, header: &str, body: &str, malformed: bool) {
        let header = self.clean(header);
        let header = header.trim();
        let body = self.clean(body);

        let block = match header.strip_prefix('@') {
            Some(rest) => {
                let (keyword, prelude) = split_keyword(rest);
                Block {
                    selectors_text: String::new(),
                    at_rule: AtRuleType::from_keyword(&keyword),
                    keyword,
                    prelude,
                    body,
                    source_order: self.next_order(),
                    is_non_rule: false,
                    malformed,
                }
            }
            None => Block {
                selectors_text: header.to_string(),
                keyword: String::new(),
                prelude: String::new(),
                body,
                at_rule: AtRuleType::None,
                source_order: self.next_order(),
                is_non_rule: false,
                // A rule without any selector cannot be matched; keep it as-is.
                malformed: malformed || strip_comments(header).trim().is_empty(),
            },
        };
        self.blocks.push(block);
    }

    fn clean(&self, text: &str) -> String {
        match self.options.comments {
            CommentMode::Preserve => text.to_string(),
            CommentMode::Strip => strip_comments(text),
        }
    }
}

/// Split `media screen and (x)` into (`media`, `screen and (x)`)
fn split_keyword(rest: &str) -> (String, String) {
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    let keyword = rest[..end].to_string();
    let prelude = rest[end..].split_whitespace().collect::<Vec<_>>().join(" ");
    (keyword, prelude)
}

/// Index just past the comment starting at `start`, or the input length when
/// it is unterminated.
fn comment_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

/// Index just past the quoted string starting at `start`. Strings end at the
/// matching quote or at a raw newline.
fn string_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Remove `/* ... */` comments outside of strings
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => i = string_end(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                out.push_str(&text[copied..i]);
                i = comment_end(bytes, i);
                copied = i;
            }
            _ => i += 1,
        }
    }
    out.push_str(&text[copied.min(text.len())..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(css: &str) -> Vec<Block> {
        segment(css, &SegmentOptions::default())
    }

    fn squash(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_simple_rules() {
        let blocks = seg(".a { color: red; } .b, .c{margin:0}");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].selectors_text, ".a");
        assert_eq!(blocks[0].body, "{ color: red; }");
        assert_eq!(blocks[1].selectors_text, ".b, .c");
        assert_eq!(blocks[1].source_order, 1);
        assert!(blocks.iter().all(|b| !b.is_non_rule && !b.malformed));
    }

    #[test]
    fn test_nested_at_rules_stay_whole() {
        let css = "@media (max-width: 600px) { .a { x: 1 } .b { y: 2 } } .c { z: 3 }";
        let blocks = seg(css);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].at_rule, AtRuleType::Media);
        assert_eq!(blocks[0].keyword, "media");
        assert_eq!(blocks[0].prelude, "(max-width: 600px)");
        assert_eq!(blocks[0].inner_body(), " .a { x: 1 } .b { y: 2 } ");
        assert_eq!(blocks[1].selectors_text, ".c");
    }

    #[test]
    fn test_at_rule_types() {
        let blocks = seg(
            "@keyframes spin{from{}to{}} @-webkit-keyframes spin{} @font-face{font-family:x} \
             @supports (display:grid){.g{}} @page{margin:0}",
        );
        let kinds: Vec<_> = blocks.iter().map(|b| b.at_rule).collect();
        assert_eq!(
            kinds,
            vec![
                AtRuleType::Keyframes,
                AtRuleType::Keyframes,
                AtRuleType::FontFace,
                AtRuleType::Supports,
                AtRuleType::Other
            ]
        );
    }

    #[test]
    fn test_unbalanced_braces_flag_malformed() {
        let blocks = seg(".ok{a:b} .broken { color: red; .inner { x: y }");
        assert_eq!(blocks.len(), 2);
        assert!(!blocks[0].malformed);
        assert!(blocks[1].malformed);
        assert_eq!(blocks[1].selectors_text, ".broken");
        assert!(blocks[1].body.ends_with("x: y }"));
    }

    #[test]
    fn test_comments_preserved_as_non_rule_blocks() {
        let blocks = seg("/* header */ .a{} /* trailing */");
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].is_non_rule);
        assert_eq!(blocks[0].body, "/* header */");
        assert!(!blocks[1].is_non_rule);
        assert_eq!(blocks[2].body, "/* trailing */");
    }

    #[test]
    fn test_comments_stripped() {
        let options = SegmentOptions {
            comments: CommentMode::Strip,
        };
        let blocks = segment("/* a */ .a { color: red; /* b */ }", &options);
        assert_eq!(blocks.len(), 1);
        assert_eq!(squash(&blocks[0].body), "{color:red;}");
    }

    #[test]
    fn test_braces_inside_comments_and_strings_do_not_count() {
        let blocks = seg(".a::after { content: \"}\"; } /* { */ .b { /* } */ x: y }");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].selectors_text, ".a::after");
        assert_eq!(blocks[2].selectors_text, ".b");
        assert!(blocks.iter().all(|b| !b.malformed));
    }

    #[test]
    fn test_statements_become_non_rule_blocks() {
        let blocks = seg("@charset \"utf-8\"; @import url(\"a;b.css\"); .a{}");
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].is_non_rule);
        assert_eq!(blocks[1].body, "@import url(\"a;b.css\");");
        assert_eq!(blocks[1].keyword, "import");
        assert!(!blocks[2].is_non_rule);
    }

    #[test]
    fn test_stray_text_is_never_dropped() {
        let blocks = seg("} .a{} trailing");
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].is_non_rule && blocks[0].malformed);
        assert!(blocks[2].is_non_rule);
        assert_eq!(blocks[2].body, "trailing");
    }

    #[test]
    fn test_render_round_trip_modulo_whitespace() {
        let css = "/* c */\n@import 'x.css';\n.a,.b{color:red}\n@media screen{.c{d:e}}\n@font-face{src:url(x)}\n.open{";
        let rendered = render(&seg(css));
        assert_eq!(squash(&rendered), squash(css));
    }

    #[test]
    fn test_selector_comments_follow_comment_mode() {
        let css = ".a /* keep me */ { x: y } @media /* print only */ print { .b { z: 1 } }";
        let rendered = render(&seg(css));
        assert!(rendered.contains(".a /* keep me */ { x: y }"));
        assert!(rendered.contains("/* print only */"));
        assert_eq!(squash(&rendered), squash(css));

        let stripped = segment(
            css,
            &SegmentOptions {
                comments: CommentMode::Strip,
            },
        );
        assert_eq!(stripped[0].selectors_text, ".a");
        assert!(!render(&stripped).contains("keep me"));
    }

    #[test]
    fn test_empty_input() {
        assert!(seg("").is_empty());
        assert!(seg("  \n\t ").is_empty());
    }

    #[test]
    fn test_empty_selector_is_malformed() {
        let blocks = seg("{ color: red }");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].malformed);
    }
}
