//! The `Pruner` facade.
//!
//! Ties segmentation, filtering, media combining and critical selection into
//! single calls over in-memory strings. All runs are pure; the optional cache
//! only short-circuits work whose result is already known.

use crate::cache::{CacheKey, ResultCache};
use crate::classifier::ReferenceMatcher;
use crate::config::PrunerConfig;
use crate::critical::{scan_above_the_fold, CriticalAllowList, CriticalSelectorGenerator, FoldElement};
use crate::filter::filter_blocks;
use crate::media::combine_media_queries;
use crate::policy::PreservationPolicy;
use crate::segmenter::{render, segment, Block, SegmentOptions};
use crate::usage::UsageSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_blocks_in: usize,
    pub retained: usize,
    pub removed: usize,
    pub merged_media_queries: usize,
    pub rejected_selectors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Output CSS plus what happened to it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    pub css: String,
    pub stats: RunStats,
    /// Headers of removed blocks, in source order
    pub removed_selectors: Vec<String>,
}

/// Purge, critical and combine runs under one configuration
#[derive(Clone)]
pub struct Pruner {
    config: PrunerConfig,
    policy: PreservationPolicy,
    critical_policy: PreservationPolicy,
    cache: Option<Arc<dyn ResultCache>>,
}

impl Default for Pruner {
    fn default() -> Self {
        Self::new(PrunerConfig::default())
    }
}

impl Pruner {
    /// Compile the preservation policies once. Bad safelist or blocklist
    /// entries are logged here and carried into every report.
    pub fn new(config: PrunerConfig) -> Self {
        let policy = PreservationPolicy::from_config(&config);
        let critical_policy = PreservationPolicy::critical_from_config(&config);
        for warning in policy.warnings() {
            warn!("{}", warning);
        }
        Self {
            config,
            policy,
            critical_policy,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &PrunerConfig {
        &self.config
    }

    pub fn warnings(&self) -> &[String] {
        self.policy.warnings()
    }

    pub fn segment(&self, css: &str) -> Vec<Block> {
        segment(
            css,
            &SegmentOptions {
                comments: self.config.comments,
            },
        )
    }

    /// Remove rules the usage set does not reference
    pub fn purge(&self, css: &str, usage: &UsageSet) -> PruneReport {
        let key = self.cache.as_ref().map(|_| self.cache_key(css, usage));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(report) = cache.get(key) {
                debug!("purge cache hit {}", key);
                return report;
            }
        }

        let blocks = self.segment(css);
        let report = self.run_filter(&blocks, usage, &self.policy);
        debug!(
            "purge: {} blocks in, {} retained, {} removed",
            report.stats.total_blocks_in, report.stats.retained, report.stats.removed
        );

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.put(key, report.clone());
        }
        report
    }

    /// Keep only rules needed for the above-the-fold part of `html`
    pub fn critical(&self, css: &str, html: &str) -> PruneReport {
        let elements = scan_above_the_fold(html, self.config.critical_line_window);
        let allow_list = self.critical_allow_list(&elements);
        debug!(
            "critical: {} fold elements, {} allowed selectors",
            elements.len(),
            allow_list.len()
        );

        let blocks = self.segment(css);
        let mut report = self.run_filter(&blocks, &allow_list, &self.critical_policy);
        if allow_list.truncated {
            report.stats.warnings.push(format!(
                "critical allow-list truncated at {} selectors",
                self.config.critical_max_selectors
            ));
        }
        report
    }

    pub fn critical_allow_list(&self, elements: &[FoldElement]) -> CriticalAllowList {
        CriticalSelectorGenerator::new(
            self.config.critical_seed_selectors.clone(),
            self.config.critical_max_selectors,
        )
        .generate(elements)
    }

    /// Merge duplicate `@media` blocks without filtering anything
    pub fn combine(&self, css: &str) -> PruneReport {
        let blocks = self.segment(css);
        let outcome = combine_media_queries(&blocks);
        debug!("combine: {} media groups merged", outcome.count);
        PruneReport {
            css: render(&outcome.blocks),
            stats: RunStats {
                total_blocks_in: blocks.len(),
                retained: outcome.blocks.len(),
                removed: 0,
                merged_media_queries: outcome.count,
                rejected_selectors: Vec::new(),
                warnings: Vec::new(),
            },
            removed_selectors: Vec::new(),
        }
    }

    /// Purge many stylesheets against one shared usage set
    pub fn purge_batch(&self, sheets: &[(String, String)], usage: &UsageSet) -> Vec<(String, PruneReport)> {
        sheets
            .par_iter()
            .map(|(name, css)| (name.clone(), self.purge(css, usage)))
            .collect()
    }

    fn run_filter<M>(&self, blocks: &[Block], usage: &M, policy: &PreservationPolicy) -> PruneReport
    where
        M: ReferenceMatcher + ?Sized,
    {
        let outcome = filter_blocks(blocks, usage, policy);

        let (retained, merged) = if self.config.combine_media_queries {
            let combined = combine_media_queries(&outcome.retained);
            (combined.blocks, combined.count)
        } else {
            (outcome.retained, 0)
        };

        PruneReport {
            css: render(&retained),
            stats: RunStats {
                total_blocks_in: outcome.stats.total_blocks_in,
                retained: outcome.stats.retained,
                removed: outcome.stats.removed,
                merged_media_queries: merged,
                rejected_selectors: outcome.stats.rejected_selectors,
                warnings: policy.warnings().to_vec(),
            },
            removed_selectors: outcome.removed.iter().map(Block::header).collect(),
        }
    }

    fn cache_key(&self, css: &str, usage: &UsageSet) -> CacheKey {
        let usage_bytes = serde_json::to_vec(usage).unwrap_or_default();
        let config_bytes = serde_json::to_vec(&self.config).unwrap_or_default();
        CacheKey::from_parts(&[css.as_bytes(), &usage_bytes, &config_bytes])
    }
}
