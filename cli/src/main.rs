use cgrade_cli::{cmd::GlobalArgs, logger};
use clap::Parser;

#[tokio::main]
async fn main() {
    let app = GlobalArgs::parse();
    logger::init(app.log_level());
    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        std::process::exit(1);
    });
}
