use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CSS pruner - removes unused rules, extracts critical CSS and merges media queries
#[derive(Parser, Debug)]
#[command(name = "css-pruner")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Remove CSS rules that no source file references
    Purge(PurgeArgs),
    /// Keep only the rules needed for above-the-fold content
    Critical(CriticalArgs),
    /// Merge duplicate @media blocks
    Combine(CombineArgs),
    /// Purge CSS read from stdin and write the result to stdout
    Pipe(PipeArgs),
}

/// Arguments for the purge command
#[derive(Parser, Debug, Clone)]
pub struct PurgeArgs {
    /// Stylesheet patterns (glob patterns supported)
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATTERN",
        required = true,
        num_args = 1..,
        help = "Stylesheets to purge"
    )]
    pub input: Vec<String>,

    /// Source file patterns scanned for usage
    #[arg(
        short = 's',
        long = "sources",
        value_name = "PATTERN",
        required = true,
        num_args = 1..,
        help = "Markup, template and script files to scan for used selectors"
    )]
    pub sources: Vec<String>,

    /// Output file or directory
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Output file (single stylesheet) or directory; defaults to <name>.pruned.css next to each input"
    )]
    pub output: Option<PathBuf>,

    /// Report file path (JSON)
    #[arg(
        short = 'r',
        long = "report",
        value_name = "PATH",
        help = "Path where the JSON run report will be written"
    )]
    pub report: Option<PathBuf>,

    /// Configuration file path
    #[arg(
        short = 'c',
        long = "config",
        value_name = "PATH",
        help = "Path to configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    /// Exclude patterns (glob patterns to exclude)
    #[arg(
        short = 'e',
        long = "exclude",
        value_name = "PATTERN",
        num_args = 0..,
        help = "Source patterns to exclude from scanning"
    )]
    pub exclude: Vec<String>,

    /// Treat sources as Tailwind templates
    #[arg(
        long = "tailwind",
        default_value_t = false,
        help = "Route utility-shaped tokens as Tailwind utilities"
    )]
    pub tailwind: bool,

    /// Merge duplicate media queries after purging
    #[arg(
        long = "combine-media",
        default_value_t = false,
        help = "Merge @media blocks with identical queries after purging"
    )]
    pub combine_media: bool,

    /// Write the report as compact JSON
    #[arg(
        long = "minify",
        default_value_t = false,
        help = "Write the report as compact JSON"
    )]
    pub minify: bool,

    /// Dry run (don't write output files)
    #[arg(
        long = "dry-run",
        default_value_t = false,
        help = "Perform the purge but don't write output files"
    )]
    pub dry_run: bool,

    /// Verbose output
    #[arg(
        short = 'v',
        long = "verbose",
        default_value_t = false,
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Number of parallel threads to use
    #[arg(
        short = 'j',
        long = "jobs",
        value_name = "NUM",
        help = "Number of parallel threads to use (defaults to number of CPU cores)"
    )]
    pub jobs: Option<usize>,
}

/// Arguments for the critical command
#[derive(Parser, Debug, Clone)]
pub struct CriticalArgs {
    /// Stylesheet to reduce
    #[arg(short = 'i', long = "input", value_name = "PATH", required = true)]
    pub input: PathBuf,

    /// Markup page whose above-the-fold content decides what is critical
    #[arg(long = "html", value_name = "PATH", required = true)]
    pub html: PathBuf,

    /// Output file; stdout when omitted
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

/// Arguments for the combine command
#[derive(Parser, Debug, Clone)]
pub struct CombineArgs {
    /// Stylesheet patterns (glob patterns supported)
    #[arg(
        short = 'i',
        long = "input",
        value_name = "PATTERN",
        required = true,
        num_args = 1..
    )]
    pub input: Vec<String>,

    /// Output file (single stylesheet) or directory
    #[arg(
        short = 'o',
        long = "output",
        value_name = "PATH",
        help = "Output file (single stylesheet) or directory; defaults to <name>.combined.css next to each input"
    )]
    pub output: Option<PathBuf>,

    #[arg(long = "dry-run", default_value_t = false)]
    pub dry_run: bool,

    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    pub verbose: bool,
}

/// Arguments for the pipe command
#[derive(Parser, Debug, Clone)]
pub struct PipeArgs {
    /// Source file patterns scanned for usage
    #[arg(
        short = 's',
        long = "sources",
        value_name = "PATTERN",
        required = true,
        num_args = 1..
    )]
    pub sources: Vec<String>,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[arg(long = "tailwind", default_value_t = false)]
    pub tailwind: bool,

    #[arg(long = "combine-media", default_value_t = false)]
    pub combine_media: bool,
}

impl Commands {
    /// Whether debug logging was requested
    pub fn verbose(&self) -> bool {
        match self {
            Commands::Purge(args) => args.verbose,
            Commands::Critical(args) => args.verbose,
            Commands::Combine(args) => args.verbose,
            Commands::Pipe(_) => false,
        }
    }
}

impl PurgeArgs {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.input.is_empty() {
            return Err("At least one input pattern must be provided".to_string());
        }

        if self.sources.is_empty() {
            return Err("At least one source pattern must be provided".to_string());
        }

        if let (Some(output), Some(report)) = (&self.output, &self.report) {
            if output == report {
                return Err("Output CSS and report paths must be different".to_string());
            }
        }

        if let Some(jobs) = self.jobs {
            if jobs == 0 {
                return Err("Number of jobs must be at least 1".to_string());
            }
        }

        Ok(())
    }
}

impl CriticalArgs {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        if self.output.as_ref() == Some(&self.input) {
            return Err("Output path must differ from the input stylesheet".to_string());
        }
        if self.html == self.input {
            return Err("Markup and stylesheet paths must be different".to_string());
        }
        Ok(())
    }
}
