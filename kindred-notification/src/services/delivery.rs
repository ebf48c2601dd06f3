use async_trait::async_trait;
use diesel::prelude::*;
use uuid::Uuid;

use kindred_shared::clients::db::DbPool;
use kindred_shared::clients::push::{PushClient, PushError};
use kindred_shared::types::event::payloads::PushRequested;

use crate::schema::profiles;

/// Where device tokens are looked up.
pub trait TokenDirectory: Send + Sync {
    fn push_token(&self, profile_id: Uuid) -> anyhow::Result<Option<String>>;
}

impl TokenDirectory for DbPool {
    fn push_token(&self, profile_id: Uuid) -> anyhow::Result<Option<String>> {
        let mut conn = self.get()?;
        let token = profiles::table
            .find(profile_id)
            .select(profiles::push_token)
            .first::<Option<String>>(&mut conn)
            .optional()?;
        Ok(token.flatten())
    }
}

#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str, data: &serde_json::Value) -> Result<(), PushError>;
}

#[async_trait]
impl PushSender for PushClient {
    async fn send(&self, token: &str, title: &str, body: &str, data: &serde_json::Value) -> Result<(), PushError> {
        PushClient::send(self, token, title, body, data).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    NoToken,
    Failed,
}

impl Delivery {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::NoToken => "no_token",
            Self::Failed => "failed",
        }
    }
}

/// Sends one push. Every failure is logged and reported as an outcome; the
/// caller acks the message either way.
pub async fn deliver(tokens: &dyn TokenDirectory, sender: &dyn PushSender, push: &PushRequested) -> Delivery {
    let target = push.target_profile_id;
    let outcome = match tokens.push_token(target) {
        Ok(Some(token)) if !token.trim().is_empty() => {
            match sender.send(&token, &push.title, &push.body, &push.data).await {
                Ok(()) => {
                    tracing::info!(target = %target, "push delivered");
                    Delivery::Sent
                }
                Err(e) => {
                    tracing::warn!(error = %e, target = %target, "push delivery failed");
                    Delivery::Failed
                }
            }
        }
        Ok(_) => {
            tracing::debug!(target = %target, "no push token registered");
            Delivery::NoToken
        }
        Err(e) => {
            tracing::error!(error = %e, target = %target, "push token lookup failed");
            Delivery::Failed
        }
    };

    metrics::counter!("kindred_push_total", "outcome" => outcome.as_str()).increment(1);
    outcome
}
