use clap::Parser;
use css_pruner::{combine, critical, handle_pipe_command, purge, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.verbose());

    match cli.command {
        Commands::Purge(args) => match purge(args).await {
            Ok(result) => {
                let totals = &result.report.totals;
                println!("Purge successful!");
                println!("  - Scanned {} source files", result.total_files_processed);
                println!("  - Processed {} stylesheets", result.report.metadata.css_files);
                println!(
                    "  - Removed {} of {} blocks ({:.1}% smaller)",
                    totals.removed,
                    totals.blocks_in,
                    totals.reduction_percent()
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Critical(args) => {
            let to_stdout = args.output.is_none();
            match critical(args).await {
                Ok(result) => {
                    if !to_stdout {
                        let totals = &result.report.totals;
                        println!("Critical CSS extracted!");
                        println!("  - Kept {} of {} blocks", totals.retained, totals.blocks_in);
                    }
                    Ok(())
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Combine(args) => match combine(args).await {
            Ok(result) => {
                println!("Combine successful!");
                println!("  - Processed {} stylesheets", result.total_files_processed);
                println!(
                    "  - Merged {} media query groups",
                    result.report.totals.merged_media_queries
                );
                Ok(())
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Pipe(args) => {
            handle_pipe_command(args).await?;
            Ok(())
        }
    }
}
