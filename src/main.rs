// src/main.rs

use vfswatch::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("vfswatch: {err:#}");
        std::process::exit(2);
    }
    if let Err(err) = run(args).await {
        tracing::error!("{err:#}");
        eprintln!("vfswatch error: {err:?}");
        std::process::exit(1);
    }
}
