// src/main.rs

use assetdag::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("assetdag error: {err:?}");
        std::process::exit(2);
    }

    if let Err(err) = run(args).await {
        eprintln!("assetdag error: {err}");
        std::process::exit(err.exit_code());
    }
}
