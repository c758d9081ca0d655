use std::process;

use clap::Parser;
use harvest_bin::{init_logging, Args, Config, IndicatifProgress};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = match Config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };
    let guard = match init_logging(config.log_path()) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error: {e:#}");
            process::exit(1);
        }
    };

    match args.harvest::<IndicatifProgress>(&config).await {
        Ok(output) => {
            info!(
                fetched = output.fetched,
                requested = output.requested,
                "harvest complete"
            );
            println!("{}", output.tweets_path.display());
            if let Some(profile) = output.profile_path {
                println!("{}", profile.display());
            }
        }
        Err(e) => {
            error!("{e:#}");
            // process::exit skips destructors, flush the log file first
            drop(guard);
            process::exit(1);
        }
    }
}
