use cucumber::{given, then, when};
use partner_adapter_engine::{
    notification::{parse_transaction_notification, Notification},
    transaction::Transaction,
    OrderManagement,
    ReconciliationError,
    ReconciliationKind,
};
use serde_json::{json, Value};

use crate::cucumber::{world::AdapterSystem, AdapterWorld};

fn notification(event_type: &str, trx_id: &str, event_id: &str) -> Notification {
    let payload = json!({
        "eventId": event_id,
        "eventType": event_type,
        "meta": {
            "resourceType": "urn:elli:epc:transaction",
            "resourceId": trx_id,
            "resourceRef": format!("https://api.example.com/partner/v2/transactions/{trx_id}")
        }
    });
    parse_transaction_notification(Some(&payload)).expect("Test notification is invalid")
}

fn transaction(value: Value) -> Transaction {
    serde_json::from_value(value).expect("Test transaction is invalid")
}

async fn process(world: &mut AdapterWorld, n: Notification, trx: Transaction) {
    let result = world.api().process_transaction_notification(&n, &trx).await;
    world.last_input = Some((n, trx));
    world.last_result = Some(result);
}

#[given("a fresh partner store")]
async fn fresh_store(world: &mut AdapterWorld) {
    world.system = Some(AdapterSystem::new().await);
}

#[when(expr = "a NEW_REQUEST for product {word} on entity {string} arrives as transaction {word}")]
async fn new_request(world: &mut AdapterWorld, product: String, entity_id: String, trx_id: String) {
    let n = notification("created", &trx_id, &format!("evt-{trx_id}"));
    let trx = transaction(json!({
        "id": trx_id,
        "entityRef": {"entityId": entity_id},
        "request": {"type": "NEW_REQUEST", "options": {"productCode": product, "rush": false}}
    }));
    process(world, n, trx).await;
}

#[when(expr = "an EXISTING_REQUEST for product {word} following {word} arrives as transaction {word}")]
async fn existing_request(world: &mut AdapterWorld, product: String, prior: String, trx_id: String) {
    let n = notification("created", &trx_id, &format!("evt-{trx_id}"));
    let trx = transaction(json!({
        "id": trx_id,
        "request": {"type": "EXISTING_REQUEST", "options": {"productCode": product, "priorReqId": prior}}
    }));
    process(world, n, trx).await;
}

#[when(expr = "an EXISTING_REQUEST without a prior request id arrives as transaction {word}")]
async fn existing_request_without_prior(world: &mut AdapterWorld, trx_id: String) {
    let n = notification("created", &trx_id, &format!("evt-{trx_id}"));
    let trx = transaction(json!({
        "id": trx_id,
        "request": {"type": "EXISTING_REQUEST", "options": {"productCode": "P1"}}
    }));
    process(world, n, trx).await;
}

#[when(expr = "transaction {word} is updated with event {word} to product {word}")]
async fn update_request(world: &mut AdapterWorld, trx_id: String, event_id: String, product: String) {
    let n = notification("updated", &trx_id, &event_id);
    let trx = transaction(json!({
        "id": trx_id,
        "request": {"type": "NEW_REQUEST", "options": {"productCode": product, "rush": true}}
    }));
    process(world, n, trx).await;
}

#[when("the same notification is delivered again")]
async fn replay(world: &mut AdapterWorld) {
    let (n, trx) = world.last_input.clone().expect("Nothing to replay");
    process(world, n, trx).await;
}

#[then(expr = "loan {word} has {int} order(s)")]
async fn loan_has_orders(world: &mut AdapterWorld, loan: String, count: usize) {
    let orders = world.db().fetch_orders_for_loan(&loan).await.expect("Error fetching orders");
    assert_eq!(orders.len(), count, "Loan {loan} has the wrong number of orders");
}

#[then(expr = "the order for loan {word} has transactions {string}")]
async fn order_transactions(world: &mut AdapterWorld, loan: String, expected: String) {
    let orders = world.db().fetch_orders_for_loan(&loan).await.expect("Error fetching orders");
    let order = orders.first().expect("No order for loan");
    let expected = expected.split(',').map(|s| s.trim().to_string()).collect::<Vec<String>>();
    assert_eq!(order.trx_ids, expected);
    assert_eq!(order.latest_trx_id, expected[expected.len() - 1]);
}

#[then(expr = "the order for loan {word} has {int} notification(s)")]
async fn order_notifications(world: &mut AdapterWorld, loan: String, count: usize) {
    let orders = world.db().fetch_orders_for_loan(&loan).await.expect("Error fetching orders");
    let order = orders.first().expect("No order for loan");
    assert_eq!(order.notifs.len(), count);
}

#[then(expr = "the order for loan {word} is for product {word}")]
async fn order_product(world: &mut AdapterWorld, loan: String, product: String) {
    let orders = world.db().fetch_orders_for_loan(&loan).await.expect("Error fetching orders");
    let order = orders.first().expect("No order for loan");
    assert_eq!(order.product.product_code, product);
}

#[then(expr = "looking up transaction {word} finds the order for loan {word}")]
async fn lookup_by_trx(world: &mut AdapterWorld, trx_id: String, loan: String) {
    let order = world.db().fetch_order_by_trx_id(&trx_id).await.expect("Error fetching order");
    let order = order.unwrap_or_else(|| panic!("No order found for {trx_id}"));
    assert_eq!(order.loan_guid, loan);
}

#[then(expr = "the notification was {word}")]
async fn outcome_kind(world: &mut AdapterWorld, kind: String) {
    let expected = match kind.as_str() {
        "created" => ReconciliationKind::Created,
        "appended" => ReconciliationKind::Appended,
        "replayed" => ReconciliationKind::Replayed,
        k => panic!("Unknown outcome kind: {k}"),
    };
    assert_eq!(world.last_outcome().kind, expected);
}

#[then(expr = "the reconciliation fails with {word}")]
async fn reconciliation_fails(world: &mut AdapterWorld, error: String) {
    let err = match world.last_result.as_ref().expect("No notification has been processed") {
        Ok(o) => panic!("Expected {error}, but reconciliation succeeded with order #{}", o.order.id),
        Err(e) => e,
    };
    let matched = match error.as_str() {
        "InvalidProduct" => matches!(err, ReconciliationError::InvalidProduct(_)),
        "MissingPriorTransaction" => matches!(err, ReconciliationError::MissingPriorTransaction),
        "OrderNotFound" => matches!(err, ReconciliationError::OrderNotFound(_)),
        "InvalidEntityReference" => matches!(err, ReconciliationError::InvalidEntityReference(_)),
        e => panic!("Unknown error kind: {e}"),
    };
    assert!(matched, "Expected {error}, got {err:?}");
}
