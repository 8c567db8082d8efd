//! Admin API over a real listener.

mod common;

use chrono::{Duration, TimeZone, Utc};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use channel_paywall::admin::{self, AdminState};
use channel_paywall::ledger::{Ledger, MemoryLedger, SubscriptionTerms};
use channel_paywall::subscription::{ExpirySweeper, ManualClock, SubscriptionService};
use channel_paywall::types::{UserId, Usdt};
use common::{tx, FakeGateway, ScriptedVerifier, CHANNEL};

const KEY: &str = "test-admin-key";

struct Harness {
    addr: SocketAddr,
    clock: Arc<ManualClock>,
    _shutdown: broadcast::Sender<()>,
}

async fn start() -> Harness {
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new(SubscriptionTerms::default()));
    let verifier = Arc::new(ScriptedVerifier::default());
    let gateway = Arc::new(FakeGateway::default());
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()));

    verifier.pays(&tx(1), Usdt::from_whole(12));
    verifier.pays(&tx(2), Usdt::from_whole(3));

    let service = Arc::new(SubscriptionService::new(
        ledger.clone(),
        verifier,
        gateway.clone(),
        clock.clone(),
        CHANNEL,
        SubscriptionTerms::default(),
    ));
    service.handle_submitted_token(UserId(42), &tx(1)).await.unwrap();
    service.handle_submitted_token(UserId(43), &tx(2)).await.unwrap();

    let sweeper = Arc::new(ExpirySweeper::new(
        ledger,
        gateway,
        clock.clone(),
        CHANNEL,
        std::time::Duration::from_secs(1800),
    ));

    let router = admin::setup_admin_router(
        AdminState::new(service, sweeper, KEY),
        std::time::Duration::from_secs(5),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, rx) = broadcast::channel(1);
    tokio::spawn(admin::serve(listener, router, rx));

    Harness {
        addr,
        clock,
        _shutdown: shutdown,
    }
}

async fn call(h: &Harness, method: reqwest::Method, path: &str, key: Option<&str>) -> (u16, Value) {
    let mut request = reqwest::Client::new().request(method, format!("http://{}{}", h.addr, path));
    if let Some(key) = key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await.unwrap();
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_requires_bearer_key() {
    let h = start().await;
    let (status, _) = call(&h, reqwest::Method::GET, "/admin/status", None).await;
    assert_eq!(status, 401);
    let (status, _) = call(&h, reqwest::Method::GET, "/admin/status", Some("wrong")).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_status_and_stats() {
    let h = start().await;

    let (status, body) = call(&h, reqwest::Method::GET, "/admin/status", Some(KEY)).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["price"], "10.00");
    assert_eq!(body["period_days"], 30);

    let (status, body) = call(&h, reqwest::Method::GET, "/admin/stats", Some(KEY)).await;
    assert_eq!(status, 200);
    assert_eq!(body["accounts"], 2);
    assert_eq!(body["active"], 1);
    assert_eq!(body["consumed"], 2);
}

#[tokio::test]
async fn test_account_lookup() {
    let h = start().await;

    let (status, body) = call(&h, reqwest::Method::GET, "/admin/accounts/42", Some(KEY)).await;
    assert_eq!(status, 200);
    assert_eq!(body["balance"], "2.00");
    assert_eq!(body["active"], true);
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["transactions"][0]["tx_id"], tx(1).as_str());

    let (status, _) = call(&h, reqwest::Method::GET, "/admin/accounts/7", Some(KEY)).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_manual_sweep() {
    let h = start().await;
    h.clock.advance(Duration::days(31));

    let (status, body) = call(&h, reqwest::Method::POST, "/admin/sweep", Some(KEY)).await;
    assert_eq!(status, 200);
    assert_eq!(body["expired"], 1);
    assert_eq!(body["revoked"], 1);

    let (_, body) = call(&h, reqwest::Method::GET, "/admin/accounts/42", Some(KEY)).await;
    assert_eq!(body["active"], false);
    assert!(body["expiry"].is_null());
}
