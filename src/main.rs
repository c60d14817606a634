// src/main.rs

use extkit::{cli, logging};

#[tokio::main]
async fn main() {
    let args = cli::parse();

    if let Err(e) = logging::init_logging(args.effective_log_level()) {
        eprintln!("extkit: failed to initialise logging: {e}");
    }

    if let Err(e) = extkit::run(args).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}
