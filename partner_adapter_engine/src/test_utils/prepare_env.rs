use std::path::Path;

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::{db_types::Product, traits::AuthManagement, SqliteDatabase};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    create_database(url).await;
    run_migrations(url).await
}

pub fn random_db_path() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/pa_test_store_{}.db", dir.display(), rand::random::<u64>())
}

pub async fn run_migrations(url: &str) -> SqliteDatabase {
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Migrations complete");
    db
}

pub async fn create_database<P: AsRef<Path>>(path: P) {
    let p = path.as_ref().as_os_str().to_str().unwrap();
    if let Err(e) = Sqlite::drop_database(p).await {
        warn!("Error dropping database {p}: {e:?}");
    }
    Sqlite::create_database(p).await.expect("Error creating database");
    info!("Created Sqlite database {p}");
}

/// Seeds the catalogue with two products: `P1` (Appraisal) and `P2` (Flood certificate).
pub async fn seed_products(db: &SqliteDatabase) -> Vec<Product> {
    let mut products = Vec::new();
    for (name, code) in [("Appraisal", "P1"), ("Flood certificate", "P2")] {
        products.push(db.upsert_product(name, code).await.expect("Error seeding products"));
    }
    products
}

/// Seeds the partner user `alice` with password `wonderland`.
pub async fn seed_user(db: &SqliteDatabase) {
    db.insert_user("alice", "wonderland").await.expect("Error seeding user");
}
