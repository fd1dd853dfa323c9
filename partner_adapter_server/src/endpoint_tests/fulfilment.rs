use std::{fs, sync::Arc};

use actix_web::{http::StatusCode, test, test::TestRequest, App};
use epc_tools::{
    data_objects::{ResourceDescriptor, TransactionStatus, UploadReport},
    DEFAULT_LOAN_FORMAT,
};
use pa_common::Secret;
use partner_adapter_engine::{
    db_types::{Order, OrderUpdate},
    traits::OrderManagement,
    AuthApi,
    SqliteDatabase,
};
use serde_json::{json, Value};

use super::{
    helpers::{patches, record_patches, seed_order, TestContext},
    mocks::MockPlatform,
};
use crate::routes::ACCESS_TOKEN_HEADER;

async fn session_token(db: &SqliteDatabase) -> String {
    let user = AuthApi::new(db.clone()).authenticate("alice", &Secret::new("wonderland".to_string())).await.unwrap();
    user.token.unwrap()
}

async fn post_action(
    ctx: &TestContext,
    platform: MockPlatform,
    order: &Order,
    token: Option<&str>,
    action: Value,
) -> (StatusCode, Value) {
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;
    let mut req = TestRequest::post().uri(&format!("/orders/{}/status", order.id)).set_json(action);
    if let Some(token) = token {
        req = req.insert_header((ACCESS_TOKEN_HEADER, token));
    }
    let res = test::call_service(&app, req.to_request()).await;
    let status = res.status();
    (status, test::read_body_json(res).await)
}

#[actix_web::test]
async fn a_session_token_is_required() {
    let ctx = TestContext::new().await;
    let order = seed_order(&ctx.db, "T1").await;
    for token in [None, Some("not-a-token")] {
        let mut platform = MockPlatform::new();
        platform.expect_patch_status().never();
        let (status, body) = post_action(&ctx, platform, &order, token, json!({"action": "cancel"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Not authorized to update the order");
    }
}

#[actix_web::test]
async fn expired_tokens_are_rejected() {
    let mut ctx = TestContext::new().await;
    ctx.config.token_lifetime = chrono::Duration::seconds(-1);
    let order = seed_order(&ctx.db, "T1").await;
    let token = session_token(&ctx.db).await;
    let mut platform = MockPlatform::new();
    platform.expect_patch_status().never();
    let (status, _) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "cancel"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn completing_an_order_attaches_files_and_loan_data() {
    let ctx = TestContext::new().await;
    let order = seed_order(&ctx.db, "T1").await;
    let order = ctx
        .db
        .append_transaction(order.id, OrderUpdate {
            trx_id: "T2".into(),
            product_id: order.product.id,
            additional_order_information: json!({"rush": true}),
            entity: json!({}),
            notification: json!({"eventType": "updated"}),
            event_id: None,
        })
        .await
        .unwrap();
    let response_dir = ctx.orders_dir.path().join(order.id.to_string()).join("response");
    fs::create_dir_all(response_dir.join("files")).unwrap();
    fs::write(response_dir.join("files").join("appraisal.pdf"), b"%PDF-1.4").unwrap();
    fs::write(response_dir.join("loan.json"), r#"{"loanAmount": 260000}"#).unwrap();
    let token = session_token(&ctx.db).await;

    let mut platform = MockPlatform::new();
    platform
        .expect_upload_resource_files()
        .withf(|trx_id, files| trx_id == "T2" && files.len() == 1 && files[0].mime_type == "application/pdf")
        .times(1)
        .returning(|_, files| {
            Ok(UploadReport {
                uploaded: vec![ResourceDescriptor {
                    id: "R1".into(),
                    name: files[0].name.clone(),
                    mime_type: files[0].mime_type.clone(),
                }],
                failed: vec![],
            })
        });
    let log = record_patches(&mut platform);

    let (status, body) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "complete"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "Completed");

    let reports = patches(&log);
    assert_eq!(reports.len(), 1);
    let (trx_id, report) = &reports[0];
    assert_eq!(trx_id, "T2");
    assert_eq!(report.status, TransactionStatus::Completed);
    assert_eq!(report.reference_number, Some(order.id.to_string()));
    assert_eq!(report.loan_format.as_deref(), Some(DEFAULT_LOAN_FORMAT));
    assert_eq!(report.loan, Some(json!({"loanAmount": 260000})));
    assert_eq!(report.resources.len(), 1);
    assert_eq!(report.resources[0].name, "appraisal.pdf");
}

#[actix_web::test]
async fn completing_without_a_working_directory_sends_no_attachments() {
    let ctx = TestContext::new().await;
    let order = seed_order(&ctx.db, "T1").await;
    let token = session_token(&ctx.db).await;
    let mut platform = MockPlatform::new();
    platform.expect_upload_resource_files().never();
    let log = record_patches(&mut platform);

    let (status, _) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "complete"})).await;
    assert_eq!(status, StatusCode::OK);
    let (_, report) = patches(&log).remove(0);
    assert_eq!(report.status, TransactionStatus::Completed);
    assert!(report.loan.is_none());
    assert!(report.resources.is_empty());
}

#[actix_web::test]
async fn corrupt_loan_file_aborts_the_report() {
    let ctx = TestContext::new().await;
    let order = seed_order(&ctx.db, "T1").await;
    let response_dir = ctx.orders_dir.path().join(order.id.to_string()).join("response");
    fs::create_dir_all(&response_dir).unwrap();
    fs::write(response_dir.join("loan.json"), "{ not json").unwrap();
    let token = session_token(&ctx.db).await;
    let mut platform = MockPlatform::new();
    platform.expect_patch_status().never();

    let (status, body) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "complete"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    let unchanged = ctx.db.fetch_order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, order.status);
}

#[actix_web::test]
async fn input_required_and_cancel() {
    let ctx = TestContext::new().await;
    let order = seed_order(&ctx.db, "T1").await;
    let token = session_token(&ctx.db).await;

    let mut platform = MockPlatform::new();
    let log = record_patches(&mut platform);
    let action = json!({"action": "input_required", "missingFields": ["borrower.ssn", "property.zip"]});
    let (status, body) = post_action(&ctx, platform, &order, Some(&token), action).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "DataNeeded");
    let (_, report) = patches(&log).remove(0);
    assert_eq!(report.status, TransactionStatus::InputRequired);
    assert_eq!(report.partner_status, "DataNeeded");
    assert_eq!(report.input_required, vec!["borrower.ssn".to_string(), "property.zip".to_string()]);

    let mut platform = MockPlatform::new();
    let log = record_patches(&mut platform);
    let (status, body) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "cancel"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order"]["status"], "Canceled");
    let (_, report) = patches(&log).remove(0);
    assert_eq!(report.status, TransactionStatus::Canceled);
}

#[actix_web::test]
async fn unknown_orders_are_not_found() {
    let ctx = TestContext::new().await;
    let mut order = seed_order(&ctx.db, "T1").await;
    order.id += 100;
    let token = session_token(&ctx.db).await;
    let mut platform = MockPlatform::new();
    platform.expect_patch_status().never();
    let (status, body) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "cancel"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
}

#[actix_web::test]
async fn unreadable_actions_are_answered_with_an_envelope() {
    let ctx = TestContext::new().await;
    let order = seed_order(&ctx.db, "T1").await;
    let token = session_token(&ctx.db).await;
    let mut platform = MockPlatform::new();
    platform.expect_patch_status().never();
    let (status, body) = post_action(&ctx, platform, &order, Some(&token), json!({"action": "explode"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["msg"], "The request body could not be read");
    assert!(body["detail"].as_str().unwrap().contains("explode"));

    let mut platform = MockPlatform::new();
    platform.expect_patch_status().never();
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;
    let req = TestRequest::post()
        .uri("/orders/first/status")
        .insert_header((ACCESS_TOKEN_HEADER, token.as_str()))
        .set_json(json!({"action": "cancel"}))
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], 400);
    assert_eq!(body["msg"], "The request path is invalid");
}
