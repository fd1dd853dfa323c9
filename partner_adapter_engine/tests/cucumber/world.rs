use cucumber::World;
use log::*;
use partner_adapter_engine::{
    helpers::KeyedLocks,
    notification::Notification,
    test_utils::prepare_env::{create_database, random_db_path, run_migrations, seed_products},
    transaction::Transaction,
    ReconciliationApi,
    ReconciliationError,
    ReconciliationOutcome,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct AdapterWorld {
    pub system: Option<AdapterSystem>,
    pub last_input: Option<(Notification, Transaction)>,
    pub last_result: Option<Result<ReconciliationOutcome, ReconciliationError>>,
}

#[derive(Debug)]
pub struct AdapterSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: ReconciliationApi<SqliteDatabase>,
}

impl AdapterWorld {
    pub fn api(&self) -> &ReconciliationApi<SqliteDatabase> {
        &self.system.as_ref().expect("ReconciliationApi not initialised").api
    }

    pub fn db(&self) -> &SqliteDatabase {
        &self.system.as_ref().expect("Database not initialised").db
    }

    pub fn last_outcome(&self) -> &ReconciliationOutcome {
        match self.last_result.as_ref().expect("No notification has been processed") {
            Ok(outcome) => outcome,
            Err(e) => panic!("Reconciliation failed: {e}"),
        }
    }
}

impl AdapterSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        create_database(&url).await;
        let db = run_migrations(&url).await;
        seed_products(&db).await;
        debug!("Created database: {url}");
        let api = ReconciliationApi::new(db.clone(), KeyedLocks::new());
        Self { db_path: url, db, api }
    }
}
