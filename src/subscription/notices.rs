//! Messages the engine and the sweep send on their own, outside a chat reply.

use std::fmt::Display;

pub const EXPIRED: &str =
    "Your subscription has expired and channel access was removed. Top up and send a new TXID to renew.";

/// Sent by the sweep when a user renewed while their old term was being revoked.
pub fn renewed_invite(link: &str) -> String {
    format!("Your subscription was renewed. Rejoin the channel here: {}", link)
}

/// Operator alert for an activation without an invite link.
pub fn invite_failure_alert(user: impl Display, tx: impl Display, error: &str) -> String {
    format!(
        "Invite link creation failed for user {} after a paid activation (tx {}): {}",
        user, tx, error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxId, UserId};

    #[test]
    fn test_invite_failure_alert_names_user_and_tx() {
        let tx = TxId::parse(&"ab".repeat(32)).unwrap();
        let alert = invite_failure_alert(UserId(42), &tx, "Bad Request: not enough rights");
        assert!(alert.contains("42"));
        assert!(alert.contains(&"ab".repeat(32)));
        assert!(alert.contains("not enough rights"));
    }
}
