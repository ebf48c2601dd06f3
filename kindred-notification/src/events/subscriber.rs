use std::sync::Arc;

use futures_lite::StreamExt;
use lapin::options::BasicAckOptions;

use kindred_shared::types::event::{payloads, routing_keys, Event};

use crate::services::delivery::{self, Delivery, PushSender, TokenDirectory};
use crate::AppState;

pub const PUSH_QUEUE: &str = "kindred-notification.push.requested";

/// Decodes one delivery body and pushes it. Undecodable bodies are dropped.
pub async fn handle_push_requested(
    tokens: &dyn TokenDirectory,
    sender: &dyn PushSender,
    body: &[u8],
) -> Option<Delivery> {
    match serde_json::from_slice::<Event<payloads::PushRequested>>(body) {
        Ok(event) => {
            tracing::debug!(event_id = %event.id, source = %event.source, "received push.requested event");
            Some(delivery::deliver(tokens, sender, &event.data).await)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to deserialize push.requested event");
            None
        }
    }
}

/// Consumes push requests until the broker closes the stream.
pub async fn listen_push_requests(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut consumer = state
        .rabbitmq
        .subscribe(
            PUSH_QUEUE,
            &[routing_keys::NOTIFICATION_PUSH_REQUESTED],
            state.config.prefetch,
        )
        .await?;

    tracing::info!(queue = PUSH_QUEUE, "listening for push requests");

    while let Some(delivery) = consumer.next().await {
        match delivery {
            Ok(delivery) => {
                handle_push_requested(state.tokens.as_ref(), state.sender.as_ref(), &delivery.data).await;
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    tracing::error!(error = %e, "failed to ack push request");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "push consumer error");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::services::delivery::fakes::{FixedTokens, RecordingSender};

    #[tokio::test]
    async fn decodes_core_events() {
        let target = Uuid::now_v7();
        let event = Event::new(
            "kindred-core",
            routing_keys::NOTIFICATION_PUSH_REQUESTED,
            payloads::PushRequested {
                target_profile_id: target,
                title: "New message".into(),
                body: "hey".into(),
                data: serde_json::json!({ "conversation_id": Uuid::now_v7() }),
            },
        );
        let body = serde_json::to_vec(&event).unwrap();
        let tokens = FixedTokens {
            tokens: [(target, "ExponentPushToken[t]".to_string())].into(),
            ..Default::default()
        };
        let sender = RecordingSender::default();

        assert_eq!(handle_push_requested(&tokens, &sender, &body).await, Some(Delivery::Sent));
        assert_eq!(sender.sent.lock().unwrap()[0].1, "New message");
    }

    #[tokio::test]
    async fn garbage_is_dropped() {
        let sender = RecordingSender::default();
        let outcome = handle_push_requested(&FixedTokens::default(), &sender, b"not json").await;
        assert_eq!(outcome, None);
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
