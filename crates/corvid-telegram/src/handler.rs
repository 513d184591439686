use tracing::{info, warn};

use crate::allow::is_allowed;
use crate::client::TelegramClient;

pub struct IncomingMessage {
    pub chat_id: i64,
    pub message_id: i64,
    pub text: String,
    pub from_username: String,
    pub from_id: i64,
}

#[async_trait::async_trait]
pub trait TelegramHandler: Send + Sync {
    async fn handle(&self, msg: IncomingMessage) -> String;
}

/// Long-poll `getUpdates` forever, gating each incoming message through the
/// allowlist before dispatching it to `handler`. Offsets advance past every
/// update seen regardless of whether it was admitted, matching Telegram's
/// at-least-once delivery contract.
pub async fn poll_loop(client: &TelegramClient, allow_users: &[String], handler: &dyn TelegramHandler) {
    let mut offset: i64 = 0;
    info!("Telegram long-polling started");

    loop {
        let updates = match client.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Telegram poll failed, retrying");
                continue;
            }
        };

        for update in updates {
            offset = update.update_id + 1;

            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };

            let from_id = message.from.as_ref().map(|f| f.id).unwrap_or(0);
            let username = message
                .from
                .as_ref()
                .and_then(|f| f.username.clone())
                .unwrap_or_default();

            if !is_allowed(allow_users, &username, &from_id.to_string()) {
                warn!(from_id, username, "blocked Telegram user");
                continue;
            }

            info!(username = %username, "Telegram message received");
            client.send_typing(message.chat.id).await;

            let reply = handler
                .handle(IncomingMessage {
                    chat_id: message.chat.id,
                    message_id: message.message_id,
                    text,
                    from_username: username,
                    from_id,
                })
                .await;

            if !reply.is_empty() {
                if let Err(e) = client.send_message(message.chat.id, &reply).await {
                    warn!(error = %e, "failed to send Telegram reply");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allow::is_allowed;

    #[test]
    fn allowlist_gate_matches_username_or_id() {
        let allow = vec!["alice".to_string(), "987654321".to_string()];
        assert!(is_allowed(&allow, "alice", "1"));
        assert!(is_allowed(&allow, "bob", "987654321"));
        assert!(!is_allowed(&allow, "bob", "111"));
    }
}
