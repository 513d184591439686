use base64::Engine;
use sha1::{Digest, Sha1};

const WS_MAGIC: &str = "258EAFA5-E914-47DA-95CA-5AB9DC085B11";
pub const MAX_HANDSHAKE_BYTES: usize = 4096;

pub struct HandshakeRequest {
    raw: String,
}

impl HandshakeRequest {
    pub fn parse(raw: &str) -> Self {
        Self { raw: raw.to_string() }
    }

    fn header(&self, name: &str) -> Option<String> {
        let name_lower = name.to_ascii_lowercase();
        for line in self.raw.split("\r\n") {
            if let Some((key, value)) = line.split_once(':') {
                if key.trim().to_ascii_lowercase() == name_lower {
                    return Some(value.trim().to_string());
                }
            }
        }
        None
    }

    pub fn is_upgrade_request(&self) -> bool {
        self.header("Upgrade")
            .map(|v| v.eq_ignore_ascii_case("websocket"))
            .unwrap_or(false)
    }

    pub fn sec_websocket_key(&self) -> Option<String> {
        self.header("Sec-WebSocket-Key")
    }

    fn query_token(&self) -> Option<String> {
        let request_line = self.raw.lines().next()?;
        let target = request_line.split_whitespace().nth(1)?;
        let (_, query) = target.split_once('?')?;
        for pair in query.split('&') {
            if let Some((k, v)) = pair.split_once('=') {
                if k == "token" {
                    return Some(v.to_string());
                }
            }
        }
        None
    }

    /// Admit iff no token is configured, or either the bearer header or the
    /// `token=` query parameter matches it.
    pub fn is_authorized(&self, configured_token: Option<&str>) -> bool {
        let Some(expected) = configured_token else {
            return true;
        };
        if let Some(auth) = self.header("Authorization") {
            if let Some(bearer) = auth.strip_prefix("Bearer ") {
                if bearer == expected {
                    return true;
                }
            }
        }
        self.query_token().as_deref() == Some(expected)
    }
}

/// `base64(SHA1(client_key ++ RFC 6455 magic GUID))`.
pub fn compute_accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_MAGIC.as_bytes());
    let digest = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(digest)
}

pub fn switching_protocols_response(accept_key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {accept_key}\r\n\r\n"
    )
}

pub const UNAUTHORIZED_RESPONSE: &str = "HTTP/1.1 401 Unauthorized\r\n\r\n";
