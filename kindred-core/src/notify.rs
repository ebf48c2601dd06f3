use serde_json::json;
use tokio::runtime::Handle;
use uuid::Uuid;

use kindred_shared::clients::rabbitmq::RabbitMQClient;
use kindred_shared::types::event::{payloads, routing_keys, Event};

use crate::models::ProfileId;

/// A push notification addressed to a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub target_profile_id: ProfileId,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new_like(target: ProfileId, liker_name: Option<&str>) -> Self {
        let who = liker_name.unwrap_or("Someone");
        Self {
            target_profile_id: target,
            title: "New like".into(),
            body: format!("{who} liked your profile"),
            data: json!({ "kind": "like" }),
        }
    }

    pub fn matched(target: ProfileId, other_name: Option<&str>, conversation_id: Uuid) -> Self {
        let who = other_name.unwrap_or("someone");
        Self {
            target_profile_id: target,
            title: "It's a match!".into(),
            body: format!("You and {who} liked each other"),
            data: json!({ "kind": "match", "conversation_id": conversation_id }),
        }
    }

    pub fn message(target: ProfileId, sender_name: Option<&str>, preview: &str, conversation_id: Uuid) -> Self {
        let preview: String = preview.chars().take(80).collect();
        Self {
            target_profile_id: target,
            title: sender_name.unwrap_or("New message").to_string(),
            body: preview,
            data: json!({ "kind": "message", "conversation_id": conversation_id }),
        }
    }
}

/// Fire-and-forget delivery. Implementations must not block the caller and
/// must swallow their own failures.
pub trait NotificationDispatcher: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Publishes `PushRequested` events for the push worker.
pub struct RabbitDispatcher {
    rabbitmq: RabbitMQClient,
    runtime: Handle,
}

impl RabbitDispatcher {
    pub fn new(rabbitmq: RabbitMQClient, runtime: Handle) -> Self {
        Self { rabbitmq, runtime }
    }
}

impl NotificationDispatcher for RabbitDispatcher {
    fn notify(&self, notification: Notification) {
        let rabbitmq = self.rabbitmq.clone();
        self.runtime.spawn(async move {
            publish_push_requested(&rabbitmq, notification).await;
        });
    }
}

pub async fn publish_push_requested(rabbitmq: &RabbitMQClient, notification: Notification) {
    let target = notification.target_profile_id;
    let event = Event::new(
        "kindred-core",
        routing_keys::NOTIFICATION_PUSH_REQUESTED,
        payloads::PushRequested {
            target_profile_id: target,
            title: notification.title,
            body: notification.body,
            data: notification.data,
        },
    )
    .with_user(target);

    if let Err(e) = rabbitmq
        .publish(routing_keys::NOTIFICATION_PUSH_REQUESTED, &event)
        .await
    {
        tracing::error!(error = %e, target = %target, "failed to publish push.requested event");
    }
}

/// Dispatcher that only logs; used when no broker is configured.
pub struct LogDispatcher;

impl NotificationDispatcher for LogDispatcher {
    fn notify(&self, notification: Notification) {
        tracing::debug!(
            target_profile = %notification.target_profile_id,
            title = %notification.title,
            "notification dropped, no broker configured"
        );
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingDispatcher {
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingDispatcher {
        pub fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }

        pub fn sent_to(&self, target: ProfileId) -> Vec<Notification> {
            self.sent()
                .into_iter()
                .filter(|n| n.target_profile_id == target)
                .collect()
        }

        pub fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }
    }

    impl NotificationDispatcher for RecordingDispatcher {
        fn notify(&self, notification: Notification) {
            self.sent.lock().unwrap().push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_preview_is_truncated() {
        let long = "x".repeat(300);
        let n = Notification::message(Uuid::nil(), Some("Sam"), &long, Uuid::nil());
        assert_eq!(n.body.chars().count(), 80);
        assert_eq!(n.title, "Sam");
        assert_eq!(n.data["kind"], "message");
    }

    #[test]
    fn like_without_name_is_anonymous() {
        let n = Notification::new_like(Uuid::nil(), None);
        assert_eq!(n.body, "Someone liked your profile");
    }
}
