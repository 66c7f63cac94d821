use clap::Parser;
use fundcast::cli::Cli;

#[tokio::main]
async fn main() {
    fundcast::logging::init();
    let cli = Cli::parse();
    if let Err(e) = fundcast::cli::run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
