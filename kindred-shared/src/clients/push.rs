use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("push API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("push ticket rejected: {0}")]
    Rejected(String),
}

/// Client for the Expo push service.
#[derive(Clone)]
pub struct PushClient {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'static str,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: ExpoTicket,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl PushClient {
    pub fn new(endpoint: &str, access_token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            access_token,
        }
    }

    pub async fn send(
        &self,
        token: &str,
        title: &str,
        body: &str,
        data: &serde_json::Value,
    ) -> Result<(), PushError> {
        let message = ExpoMessage {
            to: token,
            title,
            body,
            sound: "default",
            data: data.clone(),
        };

        let mut request = self.client.post(&self.endpoint).json(&message);
        if let Some(access_token) = &self.access_token {
            request = request.bearer_auth(access_token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PushError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let ticket: ExpoResponse = response.json().await?;
        if ticket.data.status != "ok" {
            return Err(PushError::Rejected(
                ticket.data.message.unwrap_or(ticket.data.status),
            ));
        }

        tracing::debug!(title = %title, "push notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_omits_null_data() {
        let msg = ExpoMessage {
            to: "ExponentPushToken[abc]",
            title: "New message",
            body: "hey",
            sound: "default",
            data: serde_json::Value::Null,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["to"], "ExponentPushToken[abc]");
    }

    #[test]
    fn ticket_error_message_is_parsed() {
        let raw = r#"{"data":{"status":"error","message":"DeviceNotRegistered"}}"#;
        let parsed: ExpoResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.status, "error");
        assert_eq!(parsed.data.message.as_deref(), Some("DeviceNotRegistered"));
    }
}
