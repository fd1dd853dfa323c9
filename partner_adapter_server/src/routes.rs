//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Two kinds of caller use these routes:
//! * The partner UI calls `/ui` and `/progress` while it is loaded inside the lender's application, and
//!   `/orders/{order_id}/status` when a partner user fulfils an order.
//! * Partner Connect calls `/request` and `/event` with webhook notifications. These handlers answer as soon as the
//!   referenced resource has been fetched. Everything after that runs on a spawned task and reports back to the
//!   platform through the status `PATCH` protocol, never through the webhook's HTTP response.
//!
//! Since each worker thread processes its requests sequentially, handlers must not block the current thread. Any I/O
//! is expressed as futures.
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use epc_tools::{PartnerConnectError, PartnerPlatform};
use log::*;
use partner_adapter_engine::{
    db_types::User,
    notification::{parse_notification, parse_transaction_notification, EventType, Notification, ResourceType},
    select_order,
    traits::PartnerAdapterDatabase,
    transaction::{loan_guid_from_entity_id, Credentials},
    AuthApi,
    AuthApiError,
    OrderHistoryApi,
};
use serde_json::{Map, Value};

use crate::{
    config::ServerConfig,
    data_objects::{Envelope, FulfilmentAction, OrderResponse, ProgressQuery, UiInfo, UiQuery},
    errors::ServerError,
    integrations::partner_connect::TransactionWorkflow,
};

pub const ACCESS_TOKEN_HEADER: &str = "pa_access_token";
pub const MASKED_PASSWORD: &str = "<<masked>>";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Partner UI  ----------------------------------------------------
route!(ui => Get "/ui" impl PartnerAdapterDatabase, PartnerPlatform);
/// Route handler for the partner UI bootstrap call.
///
/// Query parameters:
/// * `oid` - the origin id handed to the UI by the lender's application.
/// * `pat` - the partner access token for this UI session.
/// * `rid` - optional. The request (transaction) id the UI was opened for.
///
/// The origin is fetched from the platform and its embedded credentials must belong to a partner user. The response
/// carries the product list, the order history of the origin's loan, the origin itself (password masked), the user and
/// the order matching `rid`, if any.
pub async fn ui<B: PartnerAdapterDatabase, P: PartnerPlatform>(
    query: web::Query<UiQuery>,
    history: web::Data<OrderHistoryApi<B>>,
    auth: web::Data<AuthApi<B>>,
    platform: web::Data<P>,
) -> Result<HttpResponse, ServerError> {
    let UiQuery { oid, pat, rid } = query.into_inner();
    let (oid, pat) = match (non_empty(oid), non_empty(pat)) {
        (Some(oid), Some(pat)) => (oid, pat),
        (oid, pat) => {
            let missing = match (oid, pat) {
                (None, None) => "both the origin ID and PAT query parameters",
                (None, _) => "the origin ID query parameter",
                _ => "the PAT query parameter",
            };
            debug!("💻️ UI request is missing {missing}");
            return Err(ServerError::bad_request(
                "Unable to return the UI information",
                format!("The request is missing {missing}."),
            ));
        },
    };
    debug!("💻️ GET ui for origin {oid}");
    let products = history.products().await.map_err(|e| {
        warn!("💻️ Could not fetch the product list. {e}");
        ServerError::BackendError(format!("Error getting the list of available products. {e}"))
    })?;
    let mut origin = platform.get_origin(&oid, &pat).await.map_err(origin_error)?;
    let user = authenticate_origin(&origin, auth.as_ref(), "Not authorized to load the Partner UI").await?;
    mask_origin_password(&mut origin);
    let order_history = match origin_loan_guid(&origin) {
        Some(loan_guid) => history.orders_for_loan(loan_guid).await?,
        None => {
            warn!("💻️ Origin {oid} does not carry a usable entity reference. Returning an empty order history.");
            Vec::new()
        },
    };
    let selected_order = match rid.as_deref().and_then(|rid| select_order(&order_history, rid)) {
        Some(order) => serde_json::to_value(order).map_err(|e| ServerError::Unspecified(e.to_string()))?,
        None => Value::Object(Map::new()),
    };
    Ok(HttpResponse::Ok().json(UiInfo { products, order_history, origin, user, selected_order }))
}

route!(progress => Get "/progress" impl PartnerAdapterDatabase, PartnerPlatform);
/// Route handler for the partner UI's progress poll.
///
/// Query parameters `oid`, `pat` and `trxid` are all required. The caller is authorised through the origin's embedded
/// credentials, exactly like `/ui`. The order is located by searching every order's full transaction chain for `trxid`.
pub async fn progress<B: PartnerAdapterDatabase, P: PartnerPlatform>(
    query: web::Query<ProgressQuery>,
    history: web::Data<OrderHistoryApi<B>>,
    auth: web::Data<AuthApi<B>>,
    platform: web::Data<P>,
) -> Result<HttpResponse, ServerError> {
    let ProgressQuery { oid, pat, trxid } = query.into_inner();
    let (Some(oid), Some(pat), Some(trxid)) = (non_empty(oid), non_empty(pat), non_empty(trxid)) else {
        return Err(ServerError::bad_request(
            "Missing request information to check the progress of an order",
            "The Partner UI must include the transaction id, origin id, and the PAT.",
        ));
    };
    debug!("💻️ GET progress of {trxid}");
    let origin = platform.get_origin(&oid, &pat).await.map_err(origin_error)?;
    if is_empty_object(&origin) {
        return Err(ServerError::unauthorized(
            "Not authorized to check the progress of an order",
            "The GET Origin response was empty.",
        ));
    }
    authenticate_origin(&origin, auth.as_ref(), "Not authorized to check the progress of an order").await?;
    let order = history.order_by_trx_id(&trxid).await?.ok_or_else(|| {
        ServerError::not_found("Order not found", format!("No order is linked to transaction '{trxid}'."))
    })?;
    Ok(HttpResponse::Ok().json(OrderResponse::ok(order)))
}

//----------------------------------------------   Webhooks  ----------------------------------------------------
route!(request_notification => Post "/request" impl PartnerAdapterDatabase, PartnerPlatform);
/// Webhook for transaction `created` and `updated` notifications.
///
/// The notification is validated and the transaction is fetched from the platform. Failures up to that point are
/// returned in the HTTP response. Once the transaction is in hand, the adapter owns it: the handler answers 200 and
/// the rest of the work runs on a spawned task.
pub async fn request_notification<B: PartnerAdapterDatabase + 'static, P: PartnerPlatform + 'static>(
    body: web::Bytes,
    platform: web::Data<P>,
    workflow: web::Data<TransactionWorkflow<B, P>>,
) -> Result<HttpResponse, ServerError> {
    trace!("📨️ Received request notification");
    let payload = serde_json::from_slice::<Value>(&body).ok();
    let notification = parse_transaction_notification(payload.as_ref()).map_err(malformed_notification)?;
    let transaction = platform.get_transaction(&notification.resource_ref).await.map_err(|e| {
        warn!("📨️ Could not fetch transaction {}. {e}", notification.resource_id);
        ServerError::from(e)
    })?;
    let id = notification.resource_id.clone();
    info!("📨️ Took ownership of request {id} ({})", notification.event_type);
    actix_web::rt::spawn(async move {
        workflow.process_request(&notification, transaction).await;
    });
    Ok(HttpResponse::Ok().json(Envelope::new(
        200,
        "Downloaded request starting to process",
        format!("The Partner Adapter has received request '{id}' and will start processing the request."),
    )))
}

route!(event_notification => Post "/event" impl PartnerAdapterDatabase, PartnerPlatform);
/// Webhook for transaction event notifications. The event is fetched before the 200 is sent, then recorded against
/// the order that owns its transaction.
pub async fn event_notification<B: PartnerAdapterDatabase + 'static, P: PartnerPlatform + 'static>(
    body: web::Bytes,
    platform: web::Data<P>,
    workflow: web::Data<TransactionWorkflow<B, P>>,
) -> Result<HttpResponse, ServerError> {
    trace!("📨️ Received event notification");
    let payload = serde_json::from_slice::<Value>(&body).ok();
    let notification = parse_notification(payload.as_ref(), EventType::Created, ResourceType::TransactionEvent)
        .map_err(malformed_notification)?;
    let event = platform.get_event(&notification.resource_ref).await.map_err(|e| {
        warn!("📨️ Could not fetch event {}. {e}", notification.resource_id);
        ServerError::from(e)
    })?;
    trace!("📨️ Event {}: {event}", notification.resource_id);
    let id = notification.resource_id.clone();
    actix_web::rt::spawn(async move {
        record_event(workflow.as_ref(), &notification).await;
    });
    Ok(HttpResponse::Ok().json(Envelope::new(
        200,
        "Downloaded event starting to process",
        format!("The Partner Adapter has received event '{id}' and will start processing the request."),
    )))
}

async fn record_event<B: PartnerAdapterDatabase, P: PartnerPlatform>(
    workflow: &TransactionWorkflow<B, P>,
    notification: &Notification,
) {
    if workflow.process_event(notification).await.is_none() {
        debug!("📨️ Event {} was not linked to any order", notification.resource_id);
    }
}

//----------------------------------------------   Fulfilment  ----------------------------------------------------
route!(order_status => Post "/orders/{order_id}/status" impl PartnerAdapterDatabase, PartnerPlatform);
/// Route handler for fulfilment actions taken in the partner UI.
///
/// Requires the session token issued during authentication in the `pa_access_token` header. The body is one of
/// `{"action": "complete"}`, `{"action": "cancel"}` or `{"action": "input_required", "missingFields": [...]}`. The
/// matching status report is sent against the order's latest transaction.
pub async fn order_status<B: PartnerAdapterDatabase, P: PartnerPlatform>(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<FulfilmentAction>,
    config: web::Data<ServerConfig>,
    auth: web::Data<AuthApi<B>>,
    history: web::Data<OrderHistoryApi<B>>,
    workflow: web::Data<TransactionWorkflow<B, P>>,
) -> Result<HttpResponse, ServerError> {
    const NOT_AUTHORIZED: &str = "Not authorized to update the order";
    let token = req
        .headers()
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::unauthorized(NOT_AUTHORIZED, "The request is missing the access token."))?;
    let user = auth.validate_session_token(token, config.token_lifetime).await.map_err(|e| match e {
        AuthApiError::Store(e) => ServerError::from(e),
        e => ServerError::unauthorized(NOT_AUTHORIZED, e.to_string()),
    })?;
    let order_id = path.into_inner();
    let action = body.into_inner();
    debug!("💻️ {} requested {action:?} for order #{order_id}", user.username);
    let order = history
        .order_by_id(order_id)
        .await?
        .ok_or_else(|| ServerError::not_found("Order not found", format!("Order #{order_id} does not exist.")))?;
    let order = workflow.fulfil(&order, action).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::ok(order)))
}

//----------------------------------------------   Helpers  ----------------------------------------------------
/// Body extractor settings. A body that cannot be deserialized is answered with the usual error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|e, _req| rejected_input("The request body could not be read", e).into())
}

/// Path extractor settings. A path segment of the wrong type is answered with the usual error envelope.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|e, _req| rejected_input("The request path is invalid", e).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|e, _req| rejected_input("The query string is invalid", e).into())
}

fn rejected_input<E: std::fmt::Display>(msg: &str, e: E) -> ServerError {
    debug!("💻️ {msg}. {e}");
    ServerError::bad_request(msg, e.to_string())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

fn is_empty_object(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}

fn malformed_notification<E: std::fmt::Display>(e: E) -> ServerError {
    info!("📨️ Rejecting notification. {e}");
    ServerError::bad_request(
        "Request body malformed",
        "The notification object is missing the needed information to process.",
    )
}

fn origin_error(e: PartnerConnectError) -> ServerError {
    warn!("💻️ Could not fetch the origin. {e}");
    match e.upstream_status() {
        Some(401) => {
            ServerError::UpstreamError { msg: "Not authorized to make the GET Origin request".into(), detail: e.to_string() }
        },
        Some(_) => ServerError::UpstreamError { msg: "Error getting the origin.".into(), detail: e.to_string() },
        None => ServerError::from(e),
    }
}

/// Authenticates the partner user whose credentials are embedded in the origin.
async fn authenticate_origin<B: PartnerAdapterDatabase>(
    origin: &Value,
    auth: &AuthApi<B>,
    msg: &str,
) -> Result<User, ServerError> {
    let credentials = origin
        .get("credentials")
        .cloned()
        .and_then(|c| serde_json::from_value::<Credentials>(c).ok())
        .unwrap_or_default();
    let (username, password) = credentials
        .pair()
        .ok_or_else(|| ServerError::unauthorized(msg, "The GET Origin response is missing the credentials information."))?;
    auth.authenticate(username, password).await.map_err(|e| match e {
        AuthApiError::Store(e) => ServerError::from(e),
        e => {
            debug!("💻️ Origin credentials for '{username}' were rejected. {e}");
            ServerError::unauthorized(msg, format!("Checking the username and password failed. {e}"))
        },
    })
}

fn mask_origin_password(origin: &mut Value) {
    if let Some(password) = origin.get_mut("credentials").and_then(|c| c.get_mut("password")) {
        *password = Value::String(MASKED_PASSWORD.into());
    }
}

fn origin_loan_guid(origin: &Value) -> Option<&str> {
    let entity_id = origin.get("entityRef")?.get("entityId")?.as_str()?;
    loan_guid_from_entity_id(entity_id).ok()
}
