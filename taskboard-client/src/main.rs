use clap::Parser;
use taskboard_client::{cli, log_bridge, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = log_bridge::init(cli.verbose) {
        log_bridge::write_fallback_line(&format!("failed to initialize logger: {}", e));
    }

    if let Err(e) = cli::run(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
