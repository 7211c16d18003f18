//! Selector decomposition.
//!
//! Every place that needs to look inside a selector (the classifier, the
//! usage extractor, the critical allow-list) goes through [`decompose`], so
//! the notion of "which class/id/tag does this selector mention" is defined
//! exactly once.

/// Kind of a simple-selector piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenKind {
    Tag,
    Class,
    Id,
    Attribute,
    Pseudo,
}

/// One typed piece of a selector, with sigils stripped and escapes resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelectorToken {
    pub kind: TokenKind,
    pub value: String,
}

impl SelectorToken {
    fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Functional pseudo-classes whose arguments are selector lists
const SELECTOR_ARG_PSEUDOS: &[&str] = &[
    "not", "is", "where", "has", "matches", "-webkit-any", "-moz-any", "host", "host-context",
    "slotted", "global", "deep",
];

/// Split a selector group on top-level commas.
///
/// Commas inside `[]`, `()` or quoted strings are not separators. Empty
/// alternatives are dropped and every alternative is trimmed.
pub fn split_selector_list(text: &str) -> Vec<String> {
    split_top_level(text, |c| c == ',')
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split one selector into compound selectors on combinators
/// (whitespace, `>`, `+`, `~`).
pub fn split_compounds(selector: &str) -> Vec<String> {
    split_top_level(selector, |c| c.is_whitespace() || c == '>' || c == '+' || c == '~')
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Decompose a single selector into typed tokens.
///
/// Arguments of selector-taking pseudo-classes such as `:not(.a)` or
/// `:is(.a, .b)` contribute their own tokens, so a class mentioned anywhere in
/// the selector is visible to callers.
pub fn decompose(selector: &str) -> Vec<SelectorToken> {
    let mut tokens = Vec::new();
    for compound in split_compounds(selector) {
        decompose_compound(&compound, &mut tokens, true);
    }
    tokens
}

/// Tokens of one compound selector that the matched element itself must
/// carry. Arguments of functional pseudo-classes are skipped, so
/// `li:not(.done)` yields only `li` and the `:not` pseudo.
pub fn compound_tokens(compound: &str) -> Vec<SelectorToken> {
    let mut tokens = Vec::new();
    decompose_compound(compound, &mut tokens, false);
    tokens
}

/// Escape `name` so it reads back as a single identifier, e.g. `md:flex`
/// becomes `md\:flex` and `1/2` becomes `\31 \/2`.
pub fn escape_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut first = true;
    let mut after_dash = false;
    for c in name.chars() {
        let leading_digit = c.is_ascii_digit() && (first || after_dash);
        if leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if is_ident_char(c) {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
        after_dash = first && c == '-';
        first = false;
    }
    out
}

/// True when the tokens name at least one tag, class, id or attribute.
///
/// Selectors without such tokens (`*`, `::selection`, `:root`) cannot be tied
/// to any markup reference.
pub fn has_discriminating_tokens(tokens: &[SelectorToken]) -> bool {
    tokens.iter().any(|t| t.kind != TokenKind::Pseudo)
}

/// Canonical form of an attribute selector: brackets kept, quotes and
/// whitespace removed, so `[type = "text"]` and `[type=text]` compare equal.
pub fn normalize_attribute(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect()
}

fn split_top_level(text: &str, is_separator: impl Fn(char) -> bool) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            // Escapes never separate; a hex escape may swallow one trailing space.
            current.push(c);
            i += 1;
            let hex = chars[i..]
                .iter()
                .take(6)
                .take_while(|h| h.is_ascii_hexdigit())
                .count();
            if hex > 0 {
                current.extend(&chars[i..i + hex]);
                i += hex;
                if chars.get(i) == Some(&' ') {
                    current.push(' ');
                    i += 1;
                }
            } else if let Some(&next) = chars.get(i) {
                current.push(next);
                i += 1;
            }
            continue;
        }
        i += 1;
        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => {
                quote = Some(c);
                current.push(c);
            }
            '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            _ if depth == 0 && is_separator(c) => {
                parts.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn decompose_compound(compound: &str, out: &mut Vec<SelectorToken>, descend: bool) {
    let chars: Vec<char> = compound.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let (name, next) = read_ident(&chars, i + 1);
                if !name.is_empty() {
                    out.push(SelectorToken::new(TokenKind::Class, name));
                }
                i = next.max(i + 1);
            }
            '#' => {
                let (name, next) = read_ident(&chars, i + 1);
                if !name.is_empty() {
                    out.push(SelectorToken::new(TokenKind::Id, name));
                }
                i = next.max(i + 1);
            }
            '[' => {
                let end = find_closing(&chars, i, '[', ']');
                let mut raw: String = chars[i..(end + 1).min(chars.len())].iter().collect();
                if end >= chars.len() {
                    raw.push(']');
                }
                out.push(SelectorToken::new(TokenKind::Attribute, normalize_attribute(&raw)));
                i = end + 1;
            }
            ':' => {
                let colons = if chars.get(i + 1) == Some(&':') { 2 } else { 1 };
                let (name, next) = read_ident(&chars, i + colons);
                let name = name.to_ascii_lowercase();
                i = next;
                if i < chars.len() && chars[i] == '(' {
                    let end = find_closing(&chars, i, '(', ')');
                    let args: String = chars[i + 1..end.min(chars.len())].iter().collect();
                    if descend && SELECTOR_ARG_PSEUDOS.contains(&name.as_str()) {
                        for alternative in split_selector_list(&args) {
                            out.extend(decompose(&alternative));
                        }
                    }
                    i = end + 1;
                }
                if !name.is_empty() {
                    out.push(SelectorToken::new(
                        TokenKind::Pseudo,
                        format!("{}{}", ":".repeat(colons), name),
                    ));
                }
            }
            c if is_ident_start(c) || c == '\\' => {
                let (name, next) = read_ident(&chars, i);
                if !name.is_empty() {
                    out.push(SelectorToken::new(TokenKind::Tag, name.to_ascii_lowercase()));
                }
                i = next.max(i + 1);
            }
            _ => i += 1,
        }
    }
}

/// Index of the bracket closing the one at `open_at`, or `chars.len()` when
/// it is never closed.
fn find_closing(chars: &[char], open_at: usize, open: char, close: char) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut i = open_at;
    while i < chars.len() {
        let c = chars[i];
        if let Some(q) = quote {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == q {
                quote = None;
            }
        } else if c == '"' || c == '\'' {
            quote = Some(c);
        } else if c == '\\' {
            i += 2;
            continue;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return i;
            }
        }
        i += 1;
    }
    chars.len()
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// Read an identifier starting at `from`, resolving CSS escapes
/// (`\:` and hex escapes like `\31 `). Returns the unescaped name and the
/// index just past it.
fn read_ident(chars: &[char], from: usize) -> (String, usize) {
    let mut name = String::new();
    let mut i = from;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 1;
            if i >= chars.len() {
                break;
            }
            let hex: String = chars[i..]
                .iter()
                .take(6)
                .take_while(|h| h.is_ascii_hexdigit())
                .collect();
            if hex.is_empty() {
                name.push(chars[i]);
                i += 1;
            } else {
                i += hex.len();
                if let Some(decoded) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    name.push(decoded);
                }
                if i < chars.len() && chars[i] == ' ' {
                    i += 1;
                }
            }
            continue;
        }
        if is_ident_char(c) {
            name.push(c);
            i += 1;
        } else {
            break;
        }
    }
    (name, i)
}
