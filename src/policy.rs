//! Preservation policy.
//!
//! Non-usage rules that force a block to be kept, plus the user's safelist
//! and blocklist. Bad list entries are skipped and reported as warnings; they
//! never abort a run.

use crate::config::PrunerConfig;
use crate::errors::PrunerError;
use crate::segmenter::{AtRuleType, Block};
use crate::selector::{SelectorToken, TokenKind};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Named preservation predicates, in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preservation {
    CustomProperties,
    /// Narrower form used in critical mode: only rules that declare custom
    /// properties, not rules that merely read them through `var()`
    CustomPropertyDefinitions,
    Keyframes,
    FontFace,
    InteractiveStates,
    ResponsiveAtRules,
    Root,
}

const INTERACTIVE_PSEUDOS: &[&str] = &[
    ":hover",
    ":focus",
    ":active",
    ":visited",
    ":before",
    ":after",
    ":first-line",
    ":first-letter",
];

static CUSTOM_PROPERTY_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[{;\s])--[\w-]+\s*:").expect("custom property regex"));

impl Preservation {
    pub const ALL: [Preservation; 6] = [
        Preservation::CustomProperties,
        Preservation::Keyframes,
        Preservation::FontFace,
        Preservation::InteractiveStates,
        Preservation::ResponsiveAtRules,
        Preservation::Root,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preservation::CustomProperties => "custom-properties",
            Preservation::CustomPropertyDefinitions => "custom-property-definitions",
            Preservation::Keyframes => "keyframes",
            Preservation::FontFace => "font-face",
            Preservation::InteractiveStates => "interactive-states",
            Preservation::ResponsiveAtRules => "responsive-at-rules",
            Preservation::Root => "root",
        }
    }

    /// Does this predicate hold for `selector` inside `block`?
    pub fn holds(&self, selector: &str, block: &Block) -> bool {
        match self {
            Preservation::CustomProperties => selector.contains("--") || block.body.contains("--"),
            Preservation::CustomPropertyDefinitions => {
                block.at_rule == AtRuleType::None
                    && (selector.contains("--") || CUSTOM_PROPERTY_DECLARATION.is_match(&block.body))
            }
            Preservation::Keyframes => block.at_rule == AtRuleType::Keyframes,
            Preservation::FontFace => block.at_rule == AtRuleType::FontFace,
            Preservation::InteractiveStates => {
                let lower = selector.to_ascii_lowercase();
                // `:before` also covers `::before`
                INTERACTIVE_PSEUDOS.iter().any(|p| lower.contains(p))
            }
            Preservation::ResponsiveAtRules => block.at_rule == AtRuleType::Media,
            Preservation::Root => selector.to_ascii_lowercase().contains(":root"),
        }
    }
}

/// One safelist or blocklist entry
#[derive(Debug, Clone)]
pub enum SelectorMatcher {
    /// Matches the whole selector, or one of its class/id/tag tokens
    Literal(String),
    /// `/regex/` entry, matched against the whole selector
    Pattern(Regex),
}

impl SelectorMatcher {
    /// Parse a list entry. `/.../` (optionally `/.../i`) is a pattern.
    pub fn parse(entry: &str) -> Result<Self, PrunerError> {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(PrunerError::InvalidPattern {
                pattern: entry.to_string(),
                message: "empty entry".to_string(),
            });
        }

        let pattern = if let Some(body) = trimmed.strip_prefix('/').and_then(|r| r.strip_suffix("/i")) {
            Some(format!("(?i){}", body))
        } else if trimmed.len() > 1 && trimmed.starts_with('/') && trimmed.ends_with('/') {
            Some(trimmed[1..trimmed.len() - 1].to_string())
        } else {
            None
        };

        match pattern {
            Some(source) => Regex::new(&source)
                .map(SelectorMatcher::Pattern)
                .map_err(|e| PrunerError::InvalidPattern {
                    pattern: entry.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(SelectorMatcher::Literal(trimmed.to_string())),
        }
    }

    pub fn matches(&self, selector: &str, tokens: &[SelectorToken]) -> bool {
        match self {
            SelectorMatcher::Pattern(regex) => regex.is_match(selector),
            SelectorMatcher::Literal(literal) => {
                if literal == selector {
                    return true;
                }
                tokens.iter().any(|token| match token.kind {
                    TokenKind::Class => {
                        literal == &token.value || literal.strip_prefix('.') == Some(token.value.as_str())
                    }
                    TokenKind::Id => {
                        literal == &token.value || literal.strip_prefix('#') == Some(token.value.as_str())
                    }
                    TokenKind::Tag => literal == &token.value,
                    TokenKind::Attribute => literal == &token.value,
                    TokenKind::Pseudo => false,
                })
            }
        }
    }
}

/// Ordered preservation predicates plus safelist and blocklist
#[derive(Debug, Clone)]
pub struct PreservationPolicy {
    predicates: Vec<Preservation>,
    safelist: Vec<SelectorMatcher>,
    blocklist: Vec<SelectorMatcher>,
    warnings: Vec<String>,
}

impl Default for PreservationPolicy {
    fn default() -> Self {
        Self {
            predicates: Preservation::ALL.to_vec(),
            safelist: Vec::new(),
            blocklist: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl PreservationPolicy {
    /// A policy with no predicates and empty lists
    pub fn none() -> Self {
        Self {
            predicates: Vec::new(),
            ..Self::default()
        }
    }

    /// Build the policy used for usage-based purging
    pub fn from_config(config: &PrunerConfig) -> Self {
        let enabled = [
            (Preservation::CustomProperties, config.preserve_variables),
            (Preservation::Keyframes, config.preserve_keyframes),
            (Preservation::FontFace, config.preserve_font_face),
            (Preservation::InteractiveStates, config.preserve_interactive_states),
            (Preservation::ResponsiveAtRules, config.preserve_media_queries),
            (Preservation::Root, config.preserve_root),
        ];

        let mut policy = Self {
            predicates: enabled
                .iter()
                .filter(|(_, on)| *on)
                .map(|(p, _)| *p)
                .collect(),
            safelist: Vec::new(),
            blocklist: Vec::new(),
            warnings: Vec::new(),
        };
        policy.safelist = policy.compile_list("safelist", &config.safelist);
        policy.blocklist = policy.compile_list("blocklist", &config.blocklist);
        policy
    }

    /// Build the policy used in critical mode.
    ///
    /// Interactive states are already synthesized into the allow-list and
    /// media blocks are kept only when their inner rules are critical, so
    /// those two predicates are off. Custom properties narrow to rules that
    /// declare them; a below-the-fold rule reading `var(--x)` is not critical.
    pub fn critical_from_config(config: &PrunerConfig) -> Self {
        let mut policy = Self::from_config(config);
        policy.predicates.retain(|p| {
            !matches!(p, Preservation::InteractiveStates | Preservation::ResponsiveAtRules)
        });
        for predicate in policy.predicates.iter_mut() {
            if *predicate == Preservation::CustomProperties {
                *predicate = Preservation::CustomPropertyDefinitions;
            }
        }
        policy
    }

    fn compile_list(&mut self, list: &str, entries: &[String]) -> Vec<SelectorMatcher> {
        let mut matchers = Vec::with_capacity(entries.len());
        for entry in entries {
            match SelectorMatcher::parse(entry) {
                Ok(matcher) => matchers.push(matcher),
                Err(e) => self.warnings.push(format!("{} entry skipped: {}", list, e)),
            }
        }
        matchers
    }

    pub fn predicates(&self) -> &[Preservation] {
        &self.predicates
    }

    /// Problems found while compiling the safelist and blocklist
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// First enabled predicate that holds, in order
    pub fn preserved_by(&self, selector: &str, block: &Block) -> Option<Preservation> {
        self.predicates
            .iter()
            .copied()
            .find(|p| p.holds(selector, block))
    }

    pub fn is_safelisted(&self, selector: &str, tokens: &[SelectorToken]) -> bool {
        self.safelist.iter().any(|m| m.matches(selector, tokens))
    }

    pub fn is_blocklisted(&self, selector: &str, tokens: &[SelectorToken]) -> bool {
        self.blocklist.iter().any(|m| m.matches(selector, tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::{segment, SegmentOptions};
    use crate::selector::decompose;

    fn first_block(css: &str) -> Block {
        segment(css, &SegmentOptions::default()).remove(0)
    }

    #[test]
    fn test_predicates_in_fixed_order() {
        let block = first_block(".a:hover { color: var(--brand) }");
        let policy = PreservationPolicy::default();
        assert_eq!(
            policy.preserved_by(".a:hover", &block),
            Some(Preservation::CustomProperties)
        );

        let block = first_block(".a:hover { color: red }");
        assert_eq!(
            policy.preserved_by(".a:hover", &block),
            Some(Preservation::InteractiveStates)
        );
    }

    #[test]
    fn test_pseudo_elements_count_as_interactive() {
        let block = first_block(".x::before { content: '' }");
        assert!(Preservation::InteractiveStates.holds(".x::before", &block));
        assert!(Preservation::InteractiveStates.holds(".x:after", &block));
        assert!(!Preservation::InteractiveStates.holds(".x:disabled", &block));
    }

    #[test]
    fn test_toggles_disable_predicates() {
        let config = PrunerConfig {
            preserve_keyframes: false,
            ..PrunerConfig::default()
        };
        let policy = PreservationPolicy::from_config(&config);
        let block = first_block("@keyframes spin { from {} to {} }");
        assert_eq!(policy.preserved_by("", &block), None);
        assert!(!policy.predicates().contains(&Preservation::Keyframes));
    }

    #[test]
    fn test_literal_matches_tokens_with_or_without_sigil() {
        let tokens = decompose("nav .menu-item#main");
        for literal in ["menu-item", ".menu-item", "#main", "nav"] {
            let matcher = SelectorMatcher::parse(literal).unwrap();
            assert!(matcher.matches("nav .menu-item#main", &tokens), "{}", literal);
        }
        let matcher = SelectorMatcher::parse(".other").unwrap();
        assert!(!matcher.matches("nav .menu-item#main", &tokens));
    }

    #[test]
    fn test_pattern_entries() {
        let matcher = SelectorMatcher::parse("/^\\.modal-/").unwrap();
        assert!(matcher.matches(".modal-open", &[]));
        assert!(!matcher.matches(".not-modal", &[]));

        let insensitive = SelectorMatcher::parse("/^\\.BTN/i").unwrap();
        assert!(insensitive.matches(".btn-primary", &[]));
    }

    #[test]
    fn test_invalid_entries_become_warnings() {
        let config = PrunerConfig {
            safelist: vec!["/[unclosed/".to_string(), "ok".to_string(), "  ".to_string()],
            ..PrunerConfig::default()
        };
        let policy = PreservationPolicy::from_config(&config);
        assert_eq!(policy.warnings().len(), 2);
        assert!(policy.warnings()[0].contains("[unclosed"));
        assert!(policy.is_safelisted(".ok", &decompose(".ok")));
    }

    #[test]
    fn test_critical_policy_drops_interactive_and_media() {
        let policy = PreservationPolicy::critical_from_config(&PrunerConfig::default());
        assert!(!policy.predicates().contains(&Preservation::InteractiveStates));
        assert!(!policy.predicates().contains(&Preservation::ResponsiveAtRules));
        assert!(policy.predicates().contains(&Preservation::FontFace));
        assert!(!policy.predicates().contains(&Preservation::CustomProperties));
        assert!(policy.predicates().contains(&Preservation::CustomPropertyDefinitions));
    }

    #[test]
    fn test_custom_property_definitions_ignore_var_reads() {
        let predicate = Preservation::CustomPropertyDefinitions;
        assert!(predicate.holds(":root", &first_block(":root { --brand: #123 }")));
        assert!(predicate.holds(".theme", &first_block(".theme{--gap:4px;color:red}")));
        assert!(!predicate.holds(".below", &first_block(".below { color: var(--brand) }")));
        assert!(!predicate.holds(".x", &first_block(".x { margin: calc(1px -- 2px) }")));

        let media = first_block("@media print { :root { --brand: #000 } }");
        assert!(!predicate.holds("", &media));
        assert!(Preservation::CustomProperties.holds(".below", &first_block(".below { color: var(--brand) }")));
    }
}
