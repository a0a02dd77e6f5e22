#![cfg(not(tarpaulin_include))]

use clap::Parser;
use survey_dashboard::app;
use survey_dashboard::config::{LogArgs, ServerConfig, init_logging};

#[derive(Parser)]
#[command(name = "survey-dashboard")]
#[command(about = "Mental health in tech survey dashboard server", long_about = None)]
struct Cli {
    #[command(flatten)]
    server: ServerConfig,

    #[command(flatten)]
    log: LogArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);

    // Start the web application
    app::run(cli.server).await?;

    Ok(())
}
