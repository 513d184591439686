use serde::Deserialize;
use serde_json::json;

use corvid_core::{CorvidError, Result};

const API_BASE: &str = "https://api.telegram.org/bot";

pub struct TelegramClient {
    http: reqwest::Client,
    token: String,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub text: Option<String>,
    pub from: Option<From>,
    pub chat: Chat,
}

#[derive(Debug, Deserialize)]
pub struct From {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: token.into(),
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let url = format!("{API_BASE}{}/getUpdates?timeout=30&offset={offset}", self.token);
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;
        let parsed: GetUpdatesResponse = resp
            .json()
            .await
            .map_err(|e| CorvidError::ProtocolParse(e.to_string()))?;
        if !parsed.ok {
            return Err(CorvidError::Transport("Telegram API returned ok=false".to_string()));
        }
        Ok(parsed.result)
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let url = format!("{API_BASE}{}/sendMessage", self.token);
        let resp = self
            .http
            .post(url)
            .json(&json!({ "chat_id": chat_id, "text": text, "parse_mode": "Markdown" }))
            .send()
            .await
            .map_err(|e| CorvidError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(CorvidError::Transport(format!(
                "Telegram sendMessage failed: {}",
                resp.status()
            )));
        }
        Ok(())
    }

    pub async fn send_typing(&self, chat_id: i64) {
        let url = format!("{API_BASE}{}/sendChatAction", self.token);
        let _ = self
            .http
            .post(url)
            .json(&json!({ "chat_id": chat_id, "action": "typing" }))
            .send()
            .await;
    }
}
