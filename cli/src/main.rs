use clap::Parser;
use presentation::cli::{Cli, CliApp};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    shared::telemetry::init_tracing(cli.verbose)?;
    let mut app = CliApp::new(&cli)?;
    app.run(cli).await?;
    Ok(())
}
