//! Rule filtering.
//!
//! Applies the classifier across a block list. Pure: diagnostics come back as
//! data, nothing is logged or written here.

use crate::classifier::{classify, ReferenceMatcher};
use crate::policy::PreservationPolicy;
use crate::segmenter::Block;
use serde::{Deserialize, Serialize};

/// Counters for one filter pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub total_blocks_in: usize,
    pub retained: usize,
    pub removed: usize,
    pub rejected_selectors: Vec<String>,
}

/// Retained and removed partitions of a block list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    /// In source order
    pub retained: Vec<Block>,
    /// In source order
    pub removed: Vec<Block>,
    pub stats: FilterStats,
}

/// Partition `blocks` into retained and removed.
///
/// Non-rule and malformed blocks are always retained. The same function
/// serves critical mode: callers pass the critical allow-list as `usage` and
/// the critical policy.
pub fn filter_blocks<M>(blocks: &[Block], usage: &M, policy: &PreservationPolicy) -> FilterOutcome
where
    M: ReferenceMatcher + ?Sized,
{
    let mut outcome = FilterOutcome {
        stats: FilterStats {
            total_blocks_in: blocks.len(),
            ..FilterStats::default()
        },
        ..FilterOutcome::default()
    };

    for block in blocks {
        if block.is_non_rule || block.malformed {
            outcome.retained.push(block.clone());
            continue;
        }

        let classification = classify(block, usage, policy);
        outcome
            .stats
            .rejected_selectors
            .extend(classification.rejected_selectors.iter().cloned());
        if classification.is_keep() {
            outcome.retained.push(block.clone());
        } else {
            outcome.removed.push(block.clone());
        }
    }

    outcome.stats.retained = outcome.retained.len();
    outcome.stats.removed = outcome.removed.len();
    outcome
}
