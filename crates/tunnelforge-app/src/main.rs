use clap::Parser;
use colored::Colorize;

use tunnelforge::{logging, Cli, ControlError};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(err) = tunnelforge::app::run(cli).await {
        eprintln!("{} {err:#}", "Error:".red());
        let not_running = err
            .downcast_ref::<ControlError>()
            .is_some_and(ControlError::is_service_not_running);
        if not_running {
            eprintln!("Start the server first with: tunnelforge serve");
        }
        std::process::exit(1);
    }
}
