use std::{sync::Arc, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use epc_tools::{PartnerConnectApi, PartnerPlatform};
use log::*;
use partner_adapter_engine::{helpers::KeyedLocks, AuthApi, OrderHistoryApi, SqliteDatabase};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::partner_connect::TransactionWorkflow,
    routes::{
        health,
        json_config,
        path_config,
        query_config,
        EventNotificationRoute,
        OrderStatusRoute,
        ProgressRoute,
        RequestNotificationRoute,
        UiRoute,
    },
};

pub const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🗃️ Database at {} is ready", config.database_url);
    let platform = PartnerConnectApi::new(config.epc.clone())?;
    let srv = create_server_instance(config, db, Arc::new(platform))?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

/// Builds the HTTP server. Every worker gets its own API objects, but they all share the database pool, the platform
/// client and the reconciliation lock table.
pub fn create_server_instance<P>(config: ServerConfig, db: SqliteDatabase, platform: Arc<P>) -> Result<Server, ServerError>
where P: PartnerPlatform + Send + Sync + 'static {
    let locks = KeyedLocks::new();
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let workflow = TransactionWorkflow::new(db.clone(), locks.clone(), Arc::clone(&platform), &config);
        let history_api = OrderHistoryApi::new(db.clone());
        let auth_api = AuthApi::new(db.clone());
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("pa::access_log"))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::from(Arc::clone(&platform)))
            .app_data(web::Data::new(workflow))
            .app_data(web::Data::new(history_api))
            .app_data(web::Data::new(auth_api))
            .app_data(json_config())
            .app_data(path_config())
            .app_data(query_config())
            .service(health)
            .service(UiRoute::<SqliteDatabase, P>::new())
            .service(ProgressRoute::<SqliteDatabase, P>::new())
            .service(RequestNotificationRoute::<SqliteDatabase, P>::new())
            .service(EventNotificationRoute::<SqliteDatabase, P>::new())
            .service(OrderStatusRoute::<SqliteDatabase, P>::new())
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}
