use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, App};
use epc_tools::{data_objects::TransactionStatus, PartnerConnectError};
use partner_adapter_engine::{db_types::OrderStatusType, traits::OrderManagement};
use serde_json::{json, Value};

use super::{
    helpers::{
        eventually,
        existing_request,
        new_request,
        patches,
        record_patches,
        seed_order,
        transaction_notification,
        TestContext,
    },
    mocks::MockPlatform,
};

#[actix_web::test]
async fn malformed_notifications_are_rejected_before_any_fetch() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_transaction().never();
    platform.expect_patch_status().never();
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    let mut body = transaction_notification("created", "T1");
    body["meta"].as_object_mut().unwrap().remove("resourceRef");
    for payload in [body, json!({}), transaction_notification("deleted", "T1")] {
        let req = TestRequest::post().uri("/request").set_json(payload).to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(res).await;
        assert_eq!(body["code"], 400);
        assert_eq!(body["msg"], "Request body malformed");
        assert_eq!(body["detail"], "The notification object is missing the needed information to process.");
    }

    let req = TestRequest::post().uri("/request").set_payload("not json").to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn fetch_failures_are_returned_to_the_caller() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform
        .expect_get_transaction()
        .returning(|_| Err(PartnerConnectError::UpstreamError { status: 404, body: "no such transaction".into() }));
    platform.expect_patch_status().never();
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    let req = TestRequest::post().uri("/request").set_json(transaction_notification("created", "T1")).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], 502);
    assert!(ctx.db.fetch_order_by_trx_id("T1").await.unwrap().is_none());
}

#[actix_web::test]
async fn new_request_opens_and_acknowledges_an_order() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_transaction().times(1).returning(|_| Ok(new_request("T1", "P1")));
    let log = record_patches(&mut platform);
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    let req = TestRequest::post().uri("/request").set_json(transaction_notification("created", "T1")).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["msg"], "Downloaded request starting to process");
    assert_eq!(
        body["detail"],
        "The Partner Adapter has received request 'T1' and will start processing the request."
    );

    let acknowledged = eventually(|| async {
        let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap();
        matches!(order, Some(o) if o.status == OrderStatusType::Acknowledged)
    })
    .await;
    assert!(acknowledged);
    let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap().unwrap();
    assert_eq!(order.loan_guid, "LOAN123");
    assert_eq!(order.trx_ids, vec!["T1".to_string()]);
    assert_eq!(order.product.product_code, "P1");
    assert_eq!(order.notifs.len(), 1);

    let reports = patches(&log);
    assert_eq!(reports.len(), 1);
    let (trx_id, report) = &reports[0];
    assert_eq!(trx_id, "T1");
    assert_eq!(report.status, TransactionStatus::Processing);
    assert_eq!(report.partner_status, "Acknowledged");
    assert_eq!(report.reference_number, Some(order.id.to_string()));
}

#[actix_web::test]
async fn chained_request_extends_the_prior_order() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_transaction().returning(|r| {
        if r.ends_with("/T1") {
            Ok(new_request("T1", "P1"))
        } else {
            Ok(existing_request("T2", "T1"))
        }
    });
    let log = record_patches(&mut platform);
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    let req = TestRequest::post().uri("/request").set_json(transaction_notification("created", "T1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(eventually(|| async { patches(&log).len() == 1 }).await);

    let req = TestRequest::post().uri("/request").set_json(transaction_notification("created", "T2")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(eventually(|| async { patches(&log).len() == 2 }).await);

    let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap().unwrap();
    assert_eq!(order.trx_ids, vec!["T1".to_string(), "T2".to_string()]);
    assert_eq!(order.latest_trx_id, "T2");
    assert_eq!(order.product.product_code, "P2");
    assert_eq!(order.notifs.len(), 2);
    let reports = patches(&log);
    assert_eq!(reports[1].0, "T2");
    assert_eq!(reports[1].1.reference_number, Some(order.id.to_string()));
}

#[actix_web::test]
async fn replayed_request_is_not_reported_twice() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_transaction().times(2).returning(|_| Ok(new_request("T1", "P1")));
    let log = record_patches(&mut platform);
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    for _ in 0..2 {
        let req = TestRequest::post().uri("/request").set_json(transaction_notification("created", "T1")).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(eventually(|| async { patches(&log).len() == 1 }).await);
    }
    // Give the second task time to finish
    actix_web::rt::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(patches(&log).len(), 1);
    let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap().unwrap();
    assert_eq!(order.trx_ids, vec!["T1".to_string()]);
}

#[actix_web::test]
async fn failures_after_ownership_are_reported_to_the_platform() {
    let cases = [
        ("T1", new_request("T1", "NOPE"), 400),
        ("T2", {
            let mut trx = new_request("T2", "P1");
            trx["request"].as_object_mut().unwrap().remove("credentials");
            trx
        }, 401),
        ("T3", {
            let mut trx = new_request("T3", "P1");
            trx["request"]["credentials"]["password"] = json!("guess");
            trx
        }, 401),
        ("T4", json!({}), 401),
        ("T5", json!({"id": "T5", "request": {"type": "SOMETHING_ELSE"}}), 400),
        ("T6", existing_request("T6", "T99"), 404),
    ];
    for (trx_id, transaction, code) in cases {
        let ctx = TestContext::new().await;
        let mut platform = MockPlatform::new();
        platform.expect_get_transaction().times(1).returning(move |_| Ok(transaction.clone()));
        let log = record_patches(&mut platform);
        let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

        let req =
            TestRequest::post().uri("/request").set_json(transaction_notification("created", trx_id)).to_request();
        // Ownership was taken, so the webhook call itself succeeds
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert!(eventually(|| async { patches(&log).len() == 1 }).await, "No report for {trx_id}");

        let (reported_trx, report) = patches(&log).remove(0);
        assert_eq!(reported_trx, trx_id);
        assert_eq!(report.status, TransactionStatus::Failed);
        assert_eq!(report.partner_status, "Error");
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, code, "Unexpected error code for {trx_id}");
        assert!(ctx.db.fetch_order_by_trx_id(trx_id).await.unwrap().is_none());
    }
}

#[actix_web::test]
async fn failures_on_an_existing_order_move_it_to_error() {
    let cases = [
        ("updated", "T1", new_request("T1", "NOPE"), 400),
        ("created", "T2", {
            let mut trx = existing_request("T2", "T1");
            trx["request"]["options"]["productCode"] = json!("NOPE");
            trx
        }, 400),
        ("created", "T3", {
            let mut trx = existing_request("T3", "T1");
            trx["request"]["credentials"]["password"] = json!("guess");
            trx
        }, 401),
    ];
    for (event_type, trx_id, transaction, code) in cases {
        let ctx = TestContext::new().await;
        let seeded = seed_order(&ctx.db, "T1").await;
        ctx.db.update_order_status(seeded.id, OrderStatusType::Acknowledged).await.unwrap();
        let mut platform = MockPlatform::new();
        platform.expect_get_transaction().times(1).returning(move |_| Ok(transaction.clone()));
        let log = record_patches(&mut platform);
        let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

        let req =
            TestRequest::post().uri("/request").set_json(transaction_notification(event_type, trx_id)).to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let errored = eventually(|| async {
            let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap();
            matches!(order, Some(o) if o.status == OrderStatusType::Error)
        })
        .await;
        assert!(errored, "Order was not moved to Error by {trx_id}");

        let reports = patches(&log);
        assert_eq!(reports.len(), 1);
        let (reported_trx, report) = &reports[0];
        assert_eq!(reported_trx, trx_id);
        assert_eq!(report.status, TransactionStatus::Failed);
        assert_eq!(report.errors[0].code, code, "Unexpected error code for {trx_id}");
        assert_eq!(report.reference_number, Some(seeded.id.to_string()));
        let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap().unwrap();
        assert_eq!(order.trx_ids, vec!["T1".to_string()]);
    }
}

#[actix_web::test]
async fn empty_transactions_name_the_request() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_transaction().returning(|_| Ok(Value::Null));
    let log = record_patches(&mut platform);
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    let req = TestRequest::post().uri("/request").set_json(transaction_notification("updated", "T7")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(eventually(|| async { patches(&log).len() == 1 }).await);
    let (_, report) = patches(&log).remove(0);
    assert_eq!(report.errors[0].description, "Trying to download request 'T7' resulted in an empty object.");
}

#[actix_web::test]
async fn request_files_are_downloaded_into_the_order_directory() {
    let mut ctx = TestContext::new().await;
    ctx.config.download_request_files = true;
    let mut platform = MockPlatform::new();
    platform.expect_get_transaction().returning(|_| Ok(new_request("T1", "P1")));
    let log = record_patches(&mut platform);
    let targets = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = Arc::clone(&targets);
    platform.expect_download_resources().times(1).returning(move |trx_id, dir| {
        sink.lock().unwrap().push((trx_id.to_string(), dir.to_path_buf()));
        Ok(vec![])
    });
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;

    let req = TestRequest::post().uri("/request").set_json(transaction_notification("created", "T1")).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    assert!(eventually(|| async { !targets.lock().unwrap().is_empty() }).await);
    assert_eq!(patches(&log).len(), 1);

    let order = ctx.db.fetch_order_by_trx_id("T1").await.unwrap().unwrap();
    let (trx_id, dir) = targets.lock().unwrap()[0].clone();
    assert_eq!(trx_id, "T1");
    assert_eq!(dir, ctx.orders_dir.path().join(order.id.to_string()).join("request").join("T1").join("files"));
    assert!(dir.is_dir());
}
