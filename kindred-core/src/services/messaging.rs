use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::auth::IdentityResolver;
use kindred_shared::types::pagination::{Paginated, PaginationParams};

use crate::models::{Conversation, InboxEntry, LastMessage, Message, MessageType, Profile};
use crate::notify::Notification;
use crate::services::graph::blocked_either;
use crate::services::identity::{caller_profile, require_identity};
use crate::services::Core;
use crate::store::Repo;

fn member_conversation(repo: &mut dyn Repo, me: &Profile, conversation_id: Uuid) -> AppResult<Conversation> {
    let conversation = repo
        .find_conversation(conversation_id)?
        .ok_or_else(|| AppError::new(ErrorCode::ConversationNotFound, "conversation not found"))?;
    if !conversation.has_member(me.id) {
        return Err(AppError::new(
            ErrorCode::NotConversationMember,
            "you are not part of this conversation",
        ));
    }
    Ok(conversation)
}

fn validate_content(content: &str, message_type: MessageType, max_len: usize) -> AppResult<()> {
    if content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "message content cannot be empty"));
    }
    if content.chars().count() > max_len {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!("message content exceeds {max_len} characters"),
        ));
    }
    if message_type == MessageType::Image {
        let is_web_url = reqwest::Url::parse(content)
            .map(|url| matches!(url.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !is_web_url {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "image messages must carry an http(s) URL",
            ));
        }
    }
    Ok(())
}

impl Core {
    /// Appends a message and refreshes the conversation's last-message
    /// snapshot in the same transaction.
    pub fn send_message(
        &self,
        auth: &dyn IdentityResolver,
        conversation_id: Uuid,
        content: &str,
        message_type: MessageType,
    ) -> AppResult<Message> {
        let identity = require_identity(auth)?;
        let now = self.now();
        let max_len = self.settings.max_message_length;

        let (message, notification) = self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let conversation = member_conversation(repo, &me, conversation_id)?;
            validate_content(content, message_type, max_len)?;

            let peer = conversation
                .peer_of(me.id)
                .ok_or_else(|| AppError::internal("conversation has no peer"))?;
            if blocked_either(repo, me.id, peer)? {
                return Err(AppError::new(
                    ErrorCode::MessagingBlocked,
                    "messaging is not allowed between these users",
                ));
            }

            let message = Message {
                id: Uuid::now_v7(),
                conversation_id: conversation.id,
                sender_id: me.id,
                content: content.to_string(),
                message_type,
                created_at: now,
            };
            repo.insert_message(&message)?;
            repo.record_last_message(
                conversation.id,
                &LastMessage {
                    content: message.content.clone(),
                    sender_id: me.id,
                    message_type,
                },
                now,
            )?;

            let preview = match message_type {
                MessageType::Text => content,
                MessageType::Image => "Sent a photo",
            };
            let notification = Notification::message(peer, me.name.as_deref(), preview, conversation.id);
            Ok((message, notification))
        })?;

        metrics::counter!("kindred_messages_total").increment(1);
        self.dispatch(vec![notification]);
        Ok(message)
    }

    /// The caller's conversations, most recent activity first. Conversations
    /// whose peer no longer exists are left out.
    pub fn inbox(&self, auth: &dyn IdentityResolver) -> AppResult<Vec<InboxEntry>> {
        let identity = require_identity(auth)?;

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let conversations = repo.conversations_for(me.id)?;
            let peer_ids: Vec<_> = conversations.iter().filter_map(|c| c.peer_of(me.id)).collect();
            let peers = repo.find_profiles(&peer_ids)?;

            Ok(conversations
                .into_iter()
                .filter_map(|conversation| {
                    let peer_id = conversation.peer_of(me.id)?;
                    let peer = peers.iter().find(|p| p.id == peer_id)?.clone();
                    Some(InboxEntry { conversation, peer })
                })
                .collect())
        })
    }

    pub fn list_messages(
        &self,
        auth: &dyn IdentityResolver,
        conversation_id: Uuid,
        params: &PaginationParams,
    ) -> AppResult<Paginated<Message>> {
        let identity = require_identity(auth)?;

        let (items, total) = self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let conversation = member_conversation(repo, &me, conversation_id)?;
            let total = repo.count_messages(conversation.id)?;
            let items = repo.list_messages(conversation.id, params.offset(), params.limit())?;
            Ok((items, total))
        })?;

        Ok(Paginated::new(items, total, params))
    }
}
