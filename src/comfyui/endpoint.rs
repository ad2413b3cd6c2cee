//! Resolve a user-supplied server address into HTTP and WebSocket base URLs.
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    http_base: String,
    ws_base: String,
}

impl Endpoint {
    /// Accepts `host:port` or a URL with an `http`, `https`, `ws` or `wss`
    /// scheme. Bare addresses use plain `http`/`ws`.
    pub fn parse(server: &str) -> AppResult<Self> {
        let server = server.trim();
        if server.is_empty() {
            return Err(AppError::BadRequest("Server address is required".to_string()));
        }

        let (secure, authority) = match server.split_once("://") {
            None => (false, server),
            Some(("http" | "ws", rest)) => (false, rest),
            Some(("https" | "wss", rest)) => (true, rest),
            Some((scheme, _)) => {
                return Err(AppError::BadRequest(format!(
                    "Unsupported scheme '{}' in server address",
                    scheme
                )))
            }
        };
        let authority = authority.trim_end_matches('/');
        if authority.is_empty() {
            return Err(AppError::BadRequest("Server address is required".to_string()));
        }

        let (http, ws) = if secure { ("https", "wss") } else { ("http", "ws") };
        Ok(Endpoint {
            http_base: format!("{}://{}", http, authority),
            ws_base: format!("{}://{}", ws, authority),
        })
    }

    pub fn http_base(&self) -> &str {
        &self.http_base
    }

    pub fn ws_base(&self) -> &str {
        &self.ws_base
    }

    /// `ws://host/ws?clientId=<id>`, the socket ComfyUI addresses job events to.
    pub fn ws_url(&self, client_id: &str) -> String {
        format!("{}/ws?clientId={}", self.ws_base, client_id)
    }
}
