//! Gantry CLI entrypoint.

use clap::Parser;

mod commands;
mod handlers;
mod workflow_file;

use commands::Commands;

#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about = "Gantry workflow runner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => handlers::init().await?,
        Commands::Validate { path } => handlers::validate(&path).await?,
        Commands::Run {
            event,
            branch,
            file,
            source,
            scratch,
            dry_run,
        } => {
            let ok = handlers::run(event, &branch, file, source, scratch, dry_run).await?;
            if !ok {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
