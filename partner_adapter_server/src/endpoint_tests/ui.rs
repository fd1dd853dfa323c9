use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, App};
use epc_tools::PartnerConnectError;
use serde_json::{json, Value};

use super::{
    helpers::{origin, seed_order, TestContext},
    mocks::MockPlatform,
};

async fn get_ui(ctx: &TestContext, platform: MockPlatform, uri: &str) -> (StatusCode, Value) {
    let app = test::init_service(App::new().configure(ctx.configure(Arc::new(platform)))).await;
    let res = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
    let status = res.status();
    (status, test::read_body_json(res).await)
}

#[actix_web::test]
async fn missing_query_parameters() {
    let ctx = TestContext::new().await;
    for (uri, missing) in [
        ("/ui", "both the origin ID and PAT query parameters"),
        ("/ui?pat=abc", "the origin ID query parameter"),
        ("/ui?oid=O1", "the PAT query parameter"),
        ("/ui?oid=&pat=abc", "the origin ID query parameter"),
    ] {
        let mut platform = MockPlatform::new();
        platform.expect_get_origin().never();
        let (status, body) = get_ui(&ctx, platform, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
        assert_eq!(body["detail"], format!("The request is missing {missing}."));
    }
}

#[actix_web::test]
async fn loads_products_history_and_selected_order() {
    let ctx = TestContext::new().await;
    let first = seed_order(&ctx.db, "T1").await;
    let second = seed_order(&ctx.db, "T5").await;
    let mut platform = MockPlatform::new();
    platform
        .expect_get_origin()
        .withf(|oid, pat| oid == "O1" && pat == "PAT")
        .times(1)
        .returning(|_, _| Ok(origin("alice", "wonderland")));
    let (status, body) = get_ui(&ctx, platform, "/ui?oid=O1&pat=PAT&rid=T5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"].as_array().unwrap().len(), 2);
    assert_eq!(body["products"][0]["productCode"], "P1");
    assert_eq!(body["orderHistory"].as_array().unwrap().len(), 2);
    assert_eq!(body["orderHistory"][0]["_id"], first.id);
    assert_eq!(body["origin"]["credentials"]["password"], "<<masked>>");
    assert_eq!(body["origin"]["credentials"]["username"], "alice");
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"]["token"].as_str().is_some_and(|t| t.len() == 32));
    assert_eq!(body["selectedOrder"]["_id"], second.id);
    assert_eq!(body["selectedOrder"]["latestTrxId"], "T5");
}

#[actix_web::test]
async fn unknown_request_id_selects_nothing() {
    let ctx = TestContext::new().await;
    seed_order(&ctx.db, "T1").await;
    let mut platform = MockPlatform::new();
    platform.expect_get_origin().returning(|_, _| Ok(origin("alice", "wonderland")));
    let (status, body) = get_ui(&ctx, platform, "/ui?oid=O1&pat=PAT&rid=T404").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["selectedOrder"], json!({}));
    assert_eq!(body["orderHistory"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn origin_without_credentials_is_unauthorized() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_origin().returning(|_, _| Ok(json!({"id": "O1", "entityRef": {"entityId": "a:b:c:d:e:L1"}})));
    let (status, body) = get_ui(&ctx, platform, "/ui?oid=O1&pat=PAT").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert_eq!(body["msg"], "Not authorized to load the Partner UI");
    assert_eq!(body["detail"], "The GET Origin response is missing the credentials information.");
}

#[actix_web::test]
async fn wrong_password_is_unauthorized() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform.expect_get_origin().returning(|_, _| Ok(origin("alice", "looking-glass")));
    let (status, body) = get_ui(&ctx, platform, "/ui?oid=O1&pat=PAT").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["msg"], "Not authorized to load the Partner UI");
}

#[actix_web::test]
async fn origin_errors_are_bad_gateways() {
    let ctx = TestContext::new().await;
    let mut platform = MockPlatform::new();
    platform
        .expect_get_origin()
        .returning(|_, _| Err(PartnerConnectError::UpstreamError { status: 401, body: "expired PAT".into() }));
    let (status, body) = get_ui(&ctx, platform, "/ui?oid=O1&pat=PAT").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], 502);
    assert_eq!(body["msg"], "Not authorized to make the GET Origin request");
}
