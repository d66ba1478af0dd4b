use depot_engine::SqliteDatabase;
use depot_server::{
    cli::handle_command_line_args,
    config::ServerConfig,
    errors::ServerError,
    reconciler::start_reconciler,
};
use dotenvy::dotenv;
use log::*;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = ServerConfig::from_env_or_default();

    info!("🚀️ Starting the Depot reconciliation daemon as {}", config.instance_id);
    let db = match database(&config).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Could not connect to the database. {e}");
            return;
        },
    };
    let worker = start_reconciler(db, &config);
    if let Err(e) = worker.await {
        eprintln!("The reconciliation worker stopped unexpectedly. {e}");
    }
    println!("Bye!");
}

async fn database(config: &ServerConfig) -> Result<SqliteDatabase, ServerError> {
    let result = if config.database_url.is_empty() {
        SqliteDatabase::new(config.max_connections).await
    } else {
        SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await
    };
    result.map_err(|e| ServerError::InitializeError(e.to_string()))
}
