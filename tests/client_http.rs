//! Drives the real client against a loopback server to pin down the
//! status-code-to-error mapping.

use std::collections::HashMap;

use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::json;
use tokio::net::TcpListener;

use up_scraper::client::{ApiError, UpClient};

const TEST_TOKEN: &str = "up:yeah:test-token";

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v1")
}

fn client(base: String) -> UpClient {
    UpClient::with_base_url(SecretString::new(TEST_TOKEN.into()), base).unwrap()
}

fn up_error_body(status: &str, title: &str) -> Json<serde_json::Value> {
    Json(json!({
        "errors": [{"status": status, "title": title, "detail": ""}]
    }))
}

#[tokio::test]
async fn accounts_are_parsed_and_bearer_auth_is_sent() {
    async fn handler(
        headers: HeaderMap,
        Query(query): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let expected = format!("Bearer {TEST_TOKEN}");
        if authorization != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                up_error_body("401", "Not Authorized"),
            )
                .into_response();
        }
        assert_eq!(query.get("page[size]").map(String::as_str), Some("100"));

        Json(json!({
            "data": [{
                "type": "accounts",
                "id": "a1",
                "attributes": {
                    "displayName": "Spending",
                    "accountType": "TRANSACTIONAL",
                    "ownershipType": "INDIVIDUAL",
                    "balance": {
                        "currencyCode": "AUD",
                        "value": "123.45",
                        "valueInBaseUnits": 12345
                    },
                    "createdAt": "2021-06-01T01:02:03+10:00"
                }
            }],
            "links": {"prev": null, "next": null}
        }))
        .into_response()
    }

    let base = serve(Router::new().route("/api/v1/accounts", get(handler))).await;
    let accounts = client(base).list_accounts().await.unwrap();

    assert_eq!(accounts.data.len(), 1);
    assert_eq!(accounts.data[0].id, "a1");
    assert_eq!(
        accounts.data[0].attributes.balance.value,
        Decimal::new(12345, 2)
    );
}

#[tokio::test]
async fn ping_round_trips() {
    let base = serve(Router::new().route(
        "/api/v1/util/ping",
        get(|| async {
            Json(json!({
                "meta": {"id": "ping-1", "statusEmoji": "⚡️"}
            }))
        }),
    ))
    .await;

    let ping = client(base).ping().await.unwrap();
    assert_eq!(ping.meta.id, "ping-1");
}

#[tokio::test]
async fn unauthorized_maps_to_authentication() {
    let base = serve(Router::new().route(
        "/api/v1/accounts",
        get(|| async {
            (
                StatusCode::UNAUTHORIZED,
                up_error_body("401", "Not Authorized"),
            )
        }),
    ))
    .await;

    let err = client(base).list_accounts().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Authentication {
            status: StatusCode::UNAUTHORIZED
        }
    ));
}

#[tokio::test]
async fn forbidden_maps_to_authentication() {
    let base = serve(Router::new().route(
        "/api/v1/util/ping",
        get(|| async { (StatusCode::FORBIDDEN, up_error_body("403", "Forbidden")) }),
    ))
    .await;

    let err = client(base).ping().await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Authentication {
            status: StatusCode::FORBIDDEN
        }
    ));
}

#[tokio::test]
async fn server_error_maps_to_transient() {
    let base = serve(Router::new().route(
        "/api/v1/accounts",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;

    let err = client(base).list_accounts().await.unwrap_err();
    assert!(matches!(err, ApiError::Transient { .. }));
}

#[tokio::test]
async fn connection_refused_maps_to_transient() {
    // Bind then drop the listener so the port is known-dead.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(format!("http://{addr}/api/v1"))
        .list_accounts()
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Transient { .. }));
}

#[tokio::test]
async fn unexpected_status_maps_to_protocol() {
    let base = serve(Router::new().route(
        "/api/v1/accounts",
        get(|| async { (StatusCode::NOT_FOUND, up_error_body("404", "Not Found")) }),
    ))
    .await;

    let err = client(base).list_accounts().await.unwrap_err();
    assert!(matches!(err, ApiError::Protocol { .. }));
}

#[tokio::test]
async fn malformed_body_maps_to_protocol() {
    let base = serve(Router::new().route(
        "/api/v1/accounts",
        get(|| async { "not json at all" }),
    ))
    .await;

    let err = client(base).list_accounts().await.unwrap_err();
    assert!(matches!(err, ApiError::Protocol { .. }));
}
