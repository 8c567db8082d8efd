//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use channel_paywall::gateway::{ChannelGateway, GatewayError};
use channel_paywall::indexer::{PaymentVerifier, VerifiedTransfer, VerifyError};
use channel_paywall::types::{ChannelId, TxId, UserId, Usdt};

pub const USDT_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
pub const USDT_CONTRACT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
pub const WALLET: &str = "TMTUZTTHcJjK75twuQTZtdpJQVysHzEc7X";
pub const WALLET_HEX: &str = "417e0204a904ec3271e0733b498756d89fc01125c2";
pub const OTHER_WALLET_HEX: &str = "41bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const CHANNEL: ChannelId = ChannelId(-1001234567890);

/// Deterministic 64-hex transaction id.
pub fn tx(n: u64) -> TxId {
    TxId::parse(&format!("{:064x}", n)).unwrap()
}

/// TronGrid events body with a single USDT transfer.
pub fn transfer_body(to_hex: &str, micros: u64) -> String {
    format!(
        r#"{{"success":true,"data":[{{"event_name":"Transfer","contract_address":"{}","result":{{"from":"41aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa","to":"{}","value":"{}"}}}}],"meta":{{"page_size":1}}}}"#,
        USDT_CONTRACT, to_hex, micros
    )
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "400 Bad Request",
    }
}

/// Start a programmable mock backend on an ephemeral port.
///
/// `f` receives the raw request head (request line and headers) and returns
/// the status code and body to send back.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut head = Vec::new();
                        let mut buf = [0u8; 1024];
                        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut buf).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => head.extend_from_slice(&buf[..n]),
                            }
                        }

                        let (status, body) = f(String::from_utf8_lossy(&head).into_owned()).await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Gateway that records every call and fails on demand.
#[derive(Default)]
pub struct FakeGateway {
    pub invites: AtomicUsize,
    pub revoked: Mutex<Vec<UserId>>,
    pub notified: Mutex<Vec<(UserId, String)>>,
    pub operator_alerts: Mutex<Vec<String>>,
    pub fail_invites: AtomicBool,
    pub fail_revokes: AtomicBool,
    /// Behave like a bot started without `telegram.operator_id`.
    pub no_operator: AtomicBool,
    /// Users whose revoke always fails.
    pub stuck_members: Mutex<Vec<UserId>>,
}

impl FakeGateway {
    pub fn revoked(&self) -> Vec<UserId> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn notified(&self) -> Vec<(UserId, String)> {
        self.notified.lock().unwrap().clone()
    }

    pub fn operator_alerts(&self) -> Vec<String> {
        self.operator_alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelGateway for FakeGateway {
    async fn create_single_use_invite(&self, channel: ChannelId) -> Result<String, GatewayError> {
        if self.fail_invites.load(Ordering::SeqCst) {
            return Err(GatewayError::Api("Bad Request: not enough rights".into()));
        }
        let n = self.invites.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("https://t.me/+invite{}_{}", channel.0.unsigned_abs(), n))
    }

    async fn revoke_membership(&self, _channel: ChannelId, user: UserId) -> Result<(), GatewayError> {
        if self.fail_revokes.load(Ordering::SeqCst) || self.stuck_members.lock().unwrap().contains(&user) {
            return Err(GatewayError::Api("Bad Request: user not found".into()));
        }
        self.revoked.lock().unwrap().push(user);
        Ok(())
    }

    async fn notify(&self, user: UserId, text: &str) -> Result<(), GatewayError> {
        self.notified.lock().unwrap().push((user, text.to_string()));
        Ok(())
    }

    async fn notify_operator(&self, text: &str) -> Result<(), GatewayError> {
        if self.no_operator.load(Ordering::SeqCst) {
            return Err(GatewayError::NoOperator);
        }
        self.operator_alerts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Verifier answering from a fixed table; unknown ids have no matching event.
#[derive(Default)]
pub struct ScriptedVerifier {
    transfers: Mutex<HashMap<TxId, Result<Usdt, VerifyError>>>,
    pub calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn pays(&self, tx_id: &TxId, amount: Usdt) {
        self.transfers.lock().unwrap().insert(tx_id.clone(), Ok(amount));
    }

    pub fn fails(&self, tx_id: &TxId, error: VerifyError) {
        self.transfers.lock().unwrap().insert(tx_id.clone(), Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentVerifier for ScriptedVerifier {
    async fn verify(&self, tx_id: &TxId) -> Result<VerifiedTransfer, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entry = self.transfers.lock().unwrap().get(tx_id).cloned();
        match entry {
            Some(Ok(amount)) => Ok(VerifiedTransfer {
                tx_id: tx_id.clone(),
                amount,
                recipient: Some(WALLET_HEX.to_string()),
            }),
            Some(Err(e)) => Err(e),
            None => Err(VerifyError::NoMatchingEvent),
        }
    }
}
