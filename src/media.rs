//! Media query combining.
//!
//! Merges `@media` blocks whose normalized preludes are identical. The merged
//! block sits where the first member was; inner rules are concatenated in
//! source order without de-duplication.

use crate::segmenter::{AtRuleType, Block};
use indexmap::IndexMap;

/// Blocks sharing one normalized query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQueryGroup {
    pub normalized_query: String,
    pub members: Vec<Block>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombineOutcome {
    pub blocks: Vec<Block>,
    /// Number of query groups once any merging happened, otherwise 0
    pub count: usize,
}

/// Canonical form of a media prelude.
///
/// Lowercased and whitespace-collapsed; a leading `only` is dropped and a
/// `screen and` prefix is dropped when a condition remains. Conditions are
/// compared as strings, not parsed.
pub fn normalize_media_query(prelude: &str) -> String {
    let lower = prelude.to_lowercase();
    let collapsed = lower.split_whitespace().collect::<Vec<_>>().join(" ");
    let tightened = collapsed
        .replace("( ", "(")
        .replace(" )", ")")
        .replace(" :", ":")
        .replace(": ", ":");

    let mut query = tightened.as_str();
    if let Some(rest) = query.strip_prefix("only ") {
        query = rest.trim_start();
    }
    if let Some(rest) = query.strip_prefix("screen and ") {
        if !rest.trim().is_empty() {
            query = rest.trim_start();
        }
    }
    query.trim().to_string()
}

fn is_mergeable(block: &Block) -> bool {
    block.at_rule == AtRuleType::Media && !block.is_non_rule && !block.malformed
}

/// Group mergeable media blocks by normalized query, in first-seen order
pub fn group_media_queries(blocks: &[Block]) -> Vec<MediaQueryGroup> {
    let mut groups: IndexMap<String, MediaQueryGroup> = IndexMap::new();
    for block in blocks.iter().filter(|b| is_mergeable(b)) {
        let key = normalize_media_query(&block.prelude);
        groups
            .entry(key.clone())
            .or_insert_with(|| MediaQueryGroup {
                normalized_query: key,
                members: Vec::new(),
            })
            .members
            .push(block.clone());
    }
    groups.into_values().collect()
}

/// Merge duplicate media blocks
pub fn combine_media_queries(blocks: &[Block]) -> CombineOutcome {
    let groups = group_media_queries(blocks);
    if groups.iter().all(|g| g.members.len() < 2) {
        return CombineOutcome {
            blocks: blocks.to_vec(),
            count: 0,
        };
    }

    let by_query: IndexMap<&str, &MediaQueryGroup> = groups
        .iter()
        .map(|g| (g.normalized_query.as_str(), g))
        .collect();

    let mut merged = Vec::with_capacity(blocks.len());
    for block in blocks {
        if !is_mergeable(block) {
            merged.push(block.clone());
            continue;
        }
        let key = normalize_media_query(&block.prelude);
        let Some(group) = by_query.get(key.as_str()) else {
            merged.push(block.clone());
            continue;
        };
        let first = &group.members[0];
        if first.source_order != block.source_order {
            continue;
        }
        if group.members.len() == 1 {
            merged.push(block.clone());
        } else {
            merged.push(merge_group(group));
        }
    }

    CombineOutcome {
        blocks: merged,
        count: groups.len(),
    }
}

fn merge_group(group: &MediaQueryGroup) -> Block {
    let first = &group.members[0];
    let inner = group
        .members
        .iter()
        .map(|m| m.inner_body())
        .collect::<Vec<_>>()
        .join("\n");

    Block {
        prelude: group.normalized_query.clone(),
        body: format!("{{{}}}", inner),
        ..first.clone()
    }
}
