use anyhow::Result;
use tracing::{error, info};

mod archive;
mod browser;
mod cli;
mod crawler;
mod error;
mod sitemap;
mod storage;
mod utils;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Initialize logging
    utils::init_logging(args.verbose, args.log_file.clone())?;

    info!("starting catalog-crawler v{}", env!("CARGO_PKG_VERSION"));

    // Process commands
    match cli::process_command(args).await {
        Ok(_) => {
            info!("command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("command failed: {:#}", e);
            Err(e)
        }
    }
}
