use anyhow::{Context, Result};
use clap::Parser;

use cards_service::database::Database;
use cards_service::{logging, services, settings};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let _logging = logging::init_logging(&args.log4rs).context("Could not initialize logging")?;
    log::info!("Starting cards service.");

    let settings = settings::Settings::new(&args.config)
        .with_context(|| format!("Could not load config {}", args.config))?;

    let database = Database::connect(&settings.postgres)
        .await
        .context("Could not connect to database")?;

    services::start_services(database, settings, args.config).await
}
