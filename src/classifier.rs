//! Keep/drop decisions for a single block.

use crate::policy::PreservationPolicy;
use crate::segmenter::{segment, strip_comments, AtRuleType, Block, SegmentOptions};
use crate::selector::{decompose, has_discriminating_tokens, split_selector_list, SelectorToken, TokenKind};
use crate::usage::UsageSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Keep,
    Drop,
}

/// Outcome of classifying one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub decision: Decision,
    /// Alternatives of the selector group that were neither used nor
    /// preserved. Filled even when the block as a whole is kept.
    pub rejected_selectors: Vec<String>,
}

impl Classification {
    fn keep() -> Self {
        Self {
            decision: Decision::Keep,
            rejected_selectors: Vec::new(),
        }
    }

    fn drop_with(rejected: String) -> Self {
        Self {
            decision: Decision::Drop,
            rejected_selectors: vec![rejected],
        }
    }

    pub fn is_keep(&self) -> bool {
        self.decision == Decision::Keep
    }
}

/// Decides whether one selector alternative is referenced.
///
/// [`UsageSet`] answers for purge runs; the critical allow-list answers for
/// critical runs.
pub trait ReferenceMatcher {
    fn matches(&self, selector: &str, tokens: &[SelectorToken]) -> bool;
}

impl ReferenceMatcher for UsageSet {
    fn matches(&self, selector: &str, tokens: &[SelectorToken]) -> bool {
        is_used(selector, tokens, self)
    }
}

/// Classify one rule or at-rule block.
///
/// A selector group is dropped only when every comma-separated alternative is
/// confirmed unused and unpreserved. Non-rule and malformed blocks should be
/// routed around this function; if they reach it they are kept.
pub fn classify<M>(block: &Block, usage: &M, policy: &PreservationPolicy) -> Classification
where
    M: ReferenceMatcher + ?Sized,
{
    if block.is_non_rule || block.malformed {
        return Classification::keep();
    }
    if block.at_rule != AtRuleType::None {
        return classify_at_rule(block, usage, policy);
    }

    let mut keep = false;
    let mut rejected = Vec::new();
    for selector in split_selector_list(&strip_comments(&block.selectors_text)) {
        if selector_survives(&selector, block, usage, policy) {
            keep = true;
        } else {
            rejected.push(selector);
        }
    }

    Classification {
        decision: if keep { Decision::Keep } else { Decision::Drop },
        rejected_selectors: rejected,
    }
}

/// Is the selector referenced by the usage set?
///
/// True when the selector appears verbatim in the raw tokens, when any of its
/// class, id, tag or attribute tokens is known, or when it has no tokens that
/// could tie it to markup at all (`*`, `::selection`).
pub fn is_used(selector: &str, tokens: &[SelectorToken], usage: &UsageSet) -> bool {
    if usage.has_raw(selector) {
        return true;
    }
    if !has_discriminating_tokens(tokens) {
        return true;
    }
    tokens.iter().any(|token| match token.kind {
        TokenKind::Class => usage.has_class(&token.value),
        TokenKind::Id => usage.has_id(&token.value),
        TokenKind::Tag => usage.has_tag(&token.value),
        TokenKind::Attribute => usage.has_attribute(&token.value),
        TokenKind::Pseudo => false,
    })
}

fn selector_survives<M>(selector: &str, block: &Block, usage: &M, policy: &PreservationPolicy) -> bool
where
    M: ReferenceMatcher + ?Sized,
{
    let tokens = decompose(selector);
    if policy.is_blocklisted(selector, &tokens) {
        return false;
    }
    usage.matches(selector, &tokens)
        || policy.is_safelisted(selector, &tokens)
        || policy.preserved_by(selector, block).is_some()
}

fn classify_at_rule<M>(block: &Block, usage: &M, policy: &PreservationPolicy) -> Classification
where
    M: ReferenceMatcher + ?Sized,
{
    let header = block.header();
    if policy.is_blocklisted(&header, &[]) {
        return Classification::drop_with(header);
    }
    if policy.is_safelisted(&header, &[]) || policy.preserved_by("", block).is_some() {
        return Classification::keep();
    }

    match block.at_rule {
        AtRuleType::Media | AtRuleType::Supports => {
            // Conditional groups survive when any rule inside them does.
            let inner = segment(block.inner_body(), &SegmentOptions::default());
            let any_kept = inner.iter().any(|child| {
                child.malformed || (!child.is_non_rule && classify(child, usage, policy).is_keep())
            });
            if any_kept {
                Classification::keep()
            } else {
                Classification::drop_with(header)
            }
        }
        AtRuleType::Keyframes | AtRuleType::FontFace => Classification::drop_with(header),
        // @page, @layer, @container and friends are opaque; keep them.
        AtRuleType::Other | AtRuleType::None => Classification::keep(),
    }
}
