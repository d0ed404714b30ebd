pub mod commands;
pub mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl products for every brand still pending in the store
    Crawl {
        /// Configuration profile to use
        #[arg(short, long)]
        profile: Option<String>,

        /// Number of parallel browser workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Discover the brand backlog from the site's sitemap
    Discover {
        /// Configuration profile to use
        #[arg(short, long)]
        profile: Option<String>,

        /// Sitemap URL, defaults to the configured one
        #[arg(short, long)]
        sitemap_url: Option<String>,
    },

    /// Download each persisted product's page HTML
    Archive {
        /// Configuration profile to use
        #[arg(short, long)]
        profile: Option<String>,

        /// Output directory for the saved pages
        #[arg(short, long, default_value = "product_html")]
        output: PathBuf,
    },

    /// Show backlog and product counts
    Status {
        /// Configuration profile to use
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Manage configuration profiles
    Config {
        /// Profile name to manage
        #[arg(required = false)]
        profile: Option<String>,

        /// List all available profiles
        #[arg(short, long)]
        list: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Crawl { profile, workers } => {
            info!("starting product crawl");
            commands::crawl(profile, workers).await
        }
        Commands::Discover {
            profile,
            sitemap_url,
        } => {
            info!("starting brand discovery");
            commands::discover(profile, sitemap_url).await
        }
        Commands::Archive { profile, output } => {
            info!("archiving product pages to {}", output.display());
            commands::archive(profile, output).await
        }
        Commands::Status { profile } => commands::status(profile).await,
        Commands::Config { profile, list } => {
            if list {
                commands::list_profiles().await
            } else if let Some(profile_name) = profile {
                commands::manage_profile(profile_name).await
            } else {
                commands::show_config().await
            }
        }
    }
}
