use mongodb::{Client, Database};
use std::env;

pub async fn get_db_client() -> Database {
    let database_url = env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set as an environment variable");

    let client = Client::with_uri_str(&database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db_name = env::var("DATABASE_NAME").unwrap_or_else(|_| "carelink".to_string());
    let db = client.database(&db_name);

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("Connected to database: {}", db_name);
            tracing::debug!("Collections found: {:?}", collections);
        }
        Err(e) => {
            tracing::error!("Database '{}' may not exist or is inaccessible: {}", db_name, e);
        }
    }

    db
}
