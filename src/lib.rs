pub mod args;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod critical;
pub mod engine;
pub mod errors;
pub mod filter;
pub mod media;
pub mod policy;
pub mod report;
pub mod segmenter;
pub mod selector;
pub mod usage;

pub use args::{Cli, CombineArgs, Commands, CriticalArgs, PipeArgs, PurgeArgs};
pub use cache::{CacheKey, MemoryCache, ResultCache};
pub use classifier::{classify, Classification, Decision, ReferenceMatcher};
pub use config::PrunerConfig;
pub use critical::{scan_above_the_fold, CriticalAllowList, CriticalSelectorGenerator, FoldElement};
pub use engine::{PruneReport, Pruner, RunStats};
pub use errors::{PrunerError, Result};
pub use filter::{filter_blocks, FilterOutcome, FilterStats};
pub use media::{combine_media_queries, normalize_media_query, CombineOutcome, MediaQueryGroup};
pub use policy::{Preservation, PreservationPolicy, SelectorMatcher};
pub use report::{FileReport, Report, ReportBuilder};
pub use segmenter::{render, segment, AtRuleType, Block, CommentMode, SegmentOptions};
pub use selector::{decompose, SelectorToken, TokenKind};
pub use usage::{extract_usage, extract_usage_parallel, SourceDocument, SourceKind, UsageSet};

#[cfg(feature = "cli")]
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use tracing::{debug, info};
use tracing::warn;

/// Security configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Maximum file size in bytes (default: 10MB)
    pub max_file_size: u64,
    /// Allow symbolic links
    pub allow_symlinks: bool,
    /// Working directory for path traversal checks
    pub working_directory: PathBuf,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_size: 10 * 1024 * 1024, // 10MB
            allow_symlinks: false,
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Performance statistics
#[derive(Debug, Clone, Default)]
pub struct PerformanceStats {
    pub total_duration: Duration,
    pub extraction_duration: Duration,
    pub prune_duration: Duration,
    pub files_per_second: f64,
    pub bytes_processed: u64,
}

/// One stylesheet produced by a run
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub input: PathBuf,
    pub path: PathBuf,
    pub css: String,
}

/// Result of a purge, critical or combine run
#[derive(Debug)]
pub struct RunResult {
    pub report: Report,
    pub outputs: Vec<OutputFile>,
    pub total_files_processed: usize,
    pub performance_stats: Option<PerformanceStats>,
}

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<PrunerConfig> {
    match path {
        Some(path) => PrunerConfig::from_file(path),
        None => Ok(PrunerConfig::default()),
    }
}

/// Purge unused rules from every matching stylesheet
#[cfg(feature = "cli")]
pub async fn purge(args: PurgeArgs) -> Result<RunResult> {
    let start_time = Instant::now();
    let mut stats = PerformanceStats::default();

    args.validate().map_err(PrunerError::InvalidInput)?;

    let mut config = load_config(args.config.as_deref())?;
    if args.combine_media {
        config.combine_media_queries = true;
    }
    let security = SecurityConfig::default();
    if let Some(output) = &args.output {
        validate_output_path(output, &security)?;
    }
    if let Some(report) = &args.report {
        validate_output_path(report, &security)?;
    }

    let stylesheets = collect_files_with_security(&args.input, &[], &security)?;
    if stylesheets.is_empty() {
        return Err(PrunerError::NoFilesFound);
    }
    let sources = collect_files_with_security(&args.sources, &args.exclude, &security)?;
    if sources.is_empty() {
        return Err(PrunerError::NoFilesFound);
    }

    info!(
        "purging {} stylesheet(s) against {} source file(s)",
        stylesheets.len(),
        sources.len()
    );
    debug!("max file size = {} MB", security.max_file_size / (1024 * 1024));

    let progress_bar = create_progress_bar(sources.len() as u64, args.verbose);
    stats.bytes_processed = sources.iter().map(|f| f.1).sum();

    let extraction_start = Instant::now();
    let source_paths: Vec<PathBuf> = sources.iter().map(|(path, _)| path.clone()).collect();
    let kind = args.tailwind.then_some(SourceKind::Tailwind);
    let usage = extract_usage_from_files(&source_paths, kind, args.jobs, progress_bar.as_ref())?;
    stats.extraction_duration = extraction_start.elapsed();
    debug!("usage set holds {} tokens", usage.len());

    if let Some(ref pb) = progress_bar {
        pb.set_message("Pruning stylesheets...");
    }

    let prune_start = Instant::now();
    let pruner = Pruner::new(config);
    let sheets = read_stylesheets(&stylesheets)?;
    let results = pruner.purge_batch(&sheets, &usage);
    stats.prune_duration = prune_start.elapsed();

    let multiple = stylesheets.len() > 1;
    let mut builder = ReportBuilder::new("purge").with_files_processed(sources.len());
    let mut outputs = Vec::with_capacity(results.len());
    for ((name, input_css), (_, prune)) in sheets.iter().zip(&results) {
        let input = PathBuf::from(name);
        builder = builder.with_file(name.clone(), input_css, prune);
        outputs.push(OutputFile {
            path: resolve_output(args.output.as_deref(), &input, multiple, "pruned"),
            input,
            css: prune.css.clone(),
        });
    }
    let report = builder.build();

    stats.total_duration = start_time.elapsed();
    stats.files_per_second = sources.len() as f64 / stats.total_duration.as_secs_f64().max(f64::EPSILON);

    if let Some(pb) = progress_bar {
        pb.finish_with_message(format!("✓ Complete ({:.1} files/sec)", stats.files_per_second));
    }

    if !args.dry_run {
        write_outputs(&outputs).await?;
        if let Some(report_path) = &args.report {
            let content = if args.minify {
                report.to_compact_json()?
            } else {
                report.to_pretty_json()?
            };
            write_to(report_path, &content).await?;
        }
    }

    info!(
        "removed {} of {} blocks ({:.1}% smaller)",
        report.totals.removed,
        report.totals.blocks_in,
        report.totals.reduction_percent()
    );
    debug!(
        "extraction {:.2}s, pruning {:.2}s, total {:.2}s",
        stats.extraction_duration.as_secs_f64(),
        stats.prune_duration.as_secs_f64(),
        stats.total_duration.as_secs_f64()
    );

    Ok(RunResult {
        report,
        outputs,
        total_files_processed: sources.len(),
        performance_stats: Some(stats),
    })
}

/// Reduce a stylesheet to the rules needed above the fold of one page
#[cfg(feature = "cli")]
pub async fn critical(args: CriticalArgs) -> Result<RunResult> {
    let start_time = Instant::now();
    args.validate().map_err(PrunerError::InvalidInput)?;

    let config = load_config(args.config.as_deref())?;
    let security = SecurityConfig::default();
    validate_input_file(&args.input, &security)?;
    validate_input_file(&args.html, &security)?;
    if let Some(output) = &args.output {
        validate_output_path(output, &security)?;
    }

    let css = read_lossy(&args.input)?;
    let html = read_lossy(&args.html)?;
    let prune = Pruner::new(config).critical(&css, &html);
    for warning in &prune.stats.warnings {
        warn!("{}", warning);
    }

    let name = args.input.display().to_string();
    let report = ReportBuilder::new("critical")
        .with_files_processed(1)
        .with_file(name, &css, &prune)
        .build();

    let mut outputs = Vec::new();
    match &args.output {
        Some(path) => {
            let output = OutputFile {
                input: args.input.clone(),
                path: path.clone(),
                css: prune.css,
            };
            write_outputs(std::slice::from_ref(&output)).await?;
            outputs.push(output);
        }
        None => write_stdout(&prune.css).await?,
    }

    debug!("critical run took {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(RunResult {
        report,
        outputs,
        total_files_processed: 1,
        performance_stats: None,
    })
}

/// Merge duplicate media queries in every matching stylesheet
#[cfg(feature = "cli")]
pub async fn combine(args: CombineArgs) -> Result<RunResult> {
    let security = SecurityConfig::default();
    if let Some(output) = &args.output {
        validate_output_path(output, &security)?;
    }

    let stylesheets = collect_files_with_security(&args.input, &[], &security)?;
    if stylesheets.is_empty() {
        return Err(PrunerError::NoFilesFound);
    }

    let pruner = Pruner::default();
    let multiple = stylesheets.len() > 1;
    let mut builder = ReportBuilder::new("combine");
    let mut outputs = Vec::with_capacity(stylesheets.len());
    for (name, css) in read_stylesheets(&stylesheets)? {
        let prune = pruner.combine(&css);
        debug!("{}: {} media groups merged", name, prune.stats.merged_media_queries);
        let input = PathBuf::from(&name);
        outputs.push(OutputFile {
            path: resolve_output(args.output.as_deref(), &input, multiple, "combined"),
            input,
            css: prune.css.clone(),
        });
        builder = builder.with_file(name, &css, &prune);
    }

    if !args.dry_run {
        write_outputs(&outputs).await?;
    }

    Ok(RunResult {
        report: builder.build(),
        total_files_processed: outputs.len(),
        outputs,
        performance_stats: None,
    })
}

/// Handle pipe command - read CSS from stdin, write purged CSS to stdout
#[cfg(feature = "cli")]
pub async fn handle_pipe_command(args: PipeArgs) -> Result<()> {
    use tokio::io::{self, AsyncReadExt};

    let mut input = String::new();
    let mut stdin = io::stdin();
    stdin
        .read_to_string(&mut input)
        .await
        .map_err(|e| PrunerError::InputError(format!("Failed to read from stdin: {}", e)))?;

    if input.trim().is_empty() {
        return Ok(());
    }

    let mut config = load_config(args.config.as_deref())?;
    if args.combine_media {
        config.combine_media_queries = true;
    }

    let security = SecurityConfig::default();
    let sources = collect_files_with_security(&args.sources, &[], &security)?;
    if sources.is_empty() {
        return Err(PrunerError::NoFilesFound);
    }
    let paths: Vec<PathBuf> = sources.into_iter().map(|(path, _)| path).collect();
    let kind = args.tailwind.then_some(SourceKind::Tailwind);
    let usage = extract_usage_from_files(&paths, kind, None, None)?;

    let prune = Pruner::new(config).purge(&input, &usage);
    write_stdout(&prune.css).await
}

#[cfg(feature = "cli")]
fn create_progress_bar(len: u64, verbose: bool) -> Option<ProgressBar> {
    let multi_progress = if verbose {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    } else {
        MultiProgress::new()
    };
    if verbose {
        return None;
    }
    let pb = multi_progress.add(ProgressBar::new(len));
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
    {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message("Scanning sources...");
    Some(pb)
}

/// Scan source files for used selectors in parallel
#[cfg(feature = "cli")]
pub fn extract_usage_from_files(
    files: &[PathBuf],
    kind: Option<SourceKind>,
    jobs: Option<usize>,
    progress_bar: Option<&ProgressBar>,
) -> Result<UsageSet> {
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    if let Some(num_jobs) = jobs {
        let _ = rayon::ThreadPoolBuilder::new()
            .num_threads(num_jobs)
            .build_global();
    }

    let processed = AtomicUsize::new(0);
    let usages: Vec<UsageSet> = files
        .par_iter()
        .map(|file_path| {
            let content = read_lossy(file_path)?;
            let mut document = SourceDocument::new(file_path.display().to_string(), content);
            if let Some(kind) = kind {
                document = document.with_kind(kind);
            }
            let usage = usage::extract_document(&document);

            if let Some(pb) = progress_bar {
                let count = processed.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_position(count as u64);
                pb.set_message(format!(
                    "Scanning: {}",
                    file_path.file_name().unwrap_or_default().to_string_lossy()
                ));
            }
            Ok(usage)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(usages.into_iter().fold(UsageSet::new(), |mut acc, usage| {
        acc.merge(usage);
        acc
    }))
}

/// Read a file, replacing invalid UTF-8
#[cfg(feature = "cli")]
fn read_lossy(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(feature = "cli")]
fn read_stylesheets(files: &[(PathBuf, u64)]) -> Result<Vec<(String, String)>> {
    files
        .iter()
        .map(|(path, _)| Ok((path.display().to_string(), read_lossy(path)?)))
        .collect()
}

/// Where the result for `input` goes.
///
/// Without `-o` the result lands next to the input as `<stem>.<suffix>.css`.
/// A single input with `-o` naming a file writes that file; otherwise `-o`
/// is a directory receiving same-named files.
pub fn resolve_output(output: Option<&Path>, input: &Path, multiple: bool, suffix: &str) -> PathBuf {
    let file_name = input.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    match output {
        None => {
            let stem = input.file_stem().unwrap_or_default().to_string_lossy();
            input.with_file_name(format!("{}.{}.css", stem, suffix))
        }
        Some(path) if !multiple && !path.is_dir() => path.to_path_buf(),
        Some(dir) => dir.join(file_name),
    }
}

/// Validate that a path is safe (no path traversal)
#[cfg(feature = "cli")]
fn validate_output_path(path: &Path, security: &SecurityConfig) -> Result<()> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let working_dir = security
        .working_directory
        .canonicalize()
        .unwrap_or_else(|_| security.working_directory.clone());

    if !canonical.starts_with(&working_dir) && path.is_relative() {
        return Err(PrunerError::SecurityError(format!(
            "Output path '{}' appears to use path traversal",
            path.display()
        )));
    }

    Ok(())
}

/// Check if a file is safe to read
pub fn validate_input_file(path: &Path, security: &SecurityConfig) -> Result<()> {
    if !security.allow_symlinks && path.is_symlink() {
        return Err(PrunerError::SecurityError(format!(
            "Symbolic link not allowed: {}",
            path.display()
        )));
    }

    if security.allow_symlinks && path.is_symlink() {
        let target = fs::read_link(path).map_err(|e| {
            PrunerError::SecurityError(format!(
                "Cannot read symlink target for '{}': {}",
                path.display(),
                e
            ))
        })?;

        let canonical_target = target.canonicalize().unwrap_or_else(|_| target.clone());
        let working_dir = security
            .working_directory
            .canonicalize()
            .unwrap_or_else(|_| security.working_directory.clone());

        if !canonical_target.starts_with(&working_dir) {
            return Err(PrunerError::SecurityError(format!(
                "Symlink target '{}' is outside working directory",
                target.display()
            )));
        }
    }

    let metadata = fs::metadata(path).map_err(|e| {
        PrunerError::SecurityError(format!(
            "Cannot read file metadata for '{}': {}",
            path.display(),
            e
        ))
    })?;

    if metadata.len() > security.max_file_size {
        return Err(PrunerError::SecurityError(format!(
            "File '{}' exceeds maximum size limit ({} MB > {} MB)",
            path.display(),
            metadata.len() / (1024 * 1024),
            security.max_file_size / (1024 * 1024)
        )));
    }

    Ok(())
}

/// Collect files matching the given patterns with security checks
pub fn collect_files_with_security(
    patterns: &[String],
    exclude_patterns: &[String],
    security: &SecurityConfig,
) -> Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut skipped_count = 0;

    for pattern in patterns {
        for entry in glob::glob(pattern)? {
            let path = entry?;

            if should_exclude(&path, exclude_patterns)? {
                continue;
            }

            if path.is_dir() {
                continue;
            }

            if let Err(e) = validate_input_file(&path, security) {
                warn!("Skipping file - {}", e);
                skipped_count += 1;
                continue;
            }

            let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            if seen.insert(path.clone()) {
                files.push((path, size));
            }
        }
    }

    if skipped_count > 0 {
        warn!("Skipped {} files due to security constraints", skipped_count);
    }

    Ok(files)
}

/// Check if a path should be excluded
pub fn should_exclude(path: &Path, exclude_patterns: &[String]) -> Result<bool> {
    for pattern in exclude_patterns {
        let pattern = glob::Pattern::new(pattern)?;
        if pattern.matches_path(path) {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(feature = "cli")]
async fn write_outputs(outputs: &[OutputFile]) -> Result<()> {
    for output in outputs {
        write_to(&output.path, &output.css).await?;
    }
    Ok(())
}

#[cfg(feature = "cli")]
async fn write_to(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    write_atomic(path, content)
        .await
        .map_err(|e| PrunerError::OutputError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}

/// Write file atomically by writing to temp file then renaming
#[cfg(feature = "cli")]
pub async fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let path = path.as_ref();
    let temp_path = path.with_extension("tmp");

    let mut file = tokio::fs::File::create(&temp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;

    tokio::fs::rename(&temp_path, path).await?;

    Ok(())
}

#[cfg(feature = "cli")]
async fn write_stdout(content: &str) -> Result<()> {
    use tokio::io::{self, AsyncWriteExt};

    let mut stdout = io::stdout();
    stdout
        .write_all(content.as_bytes())
        .await
        .map_err(|e| PrunerError::OutputError {
            path: "stdout".to_string(),
            message: e.to_string(),
        })?;

    stdout.flush().await.map_err(|e| PrunerError::OutputError {
        path: "stdout".to_string(),
        message: e.to_string(),
    })?;

    Ok(())
}
