use clap::Parser;
use rental_portal::{
    admin::{self, AdminCli, AdminCommand, AdminError},
    config::AppConfig,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rental_portal=info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = AdminCli::parse();

    if let Err(e) = execute(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn execute(command: AdminCommand) -> Result<(), AdminError> {
    // The dry run only prints SQL and must work without a database.
    if command == (AdminCommand::Migrate { dry_run: true }) {
        println!("{}", admin::dry_run_plan(&rental_portal::migrations::ALL_STEPS));
        return Ok(());
    }

    let config = AppConfig::load()?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&config.db_url)
        .await?;

    admin::run(command, &pool, &config).await
}
