use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult};

use crate::models::{
    Account, Block, Conversation, Edge, EdgeStatus, LastMessage, Message, Profile, ProfileId,
    Rejection, Report, SavedLocation,
};
use crate::store::{Repo, Store};

/// Whole-database snapshot. Vectors keep insertion order, which stands in
/// for creation order. Tables are shared between snapshots and copied on
/// first write.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    accounts: Arc<Vec<Account>>,
    profiles: Arc<Vec<Profile>>,
    edges: Arc<Vec<Edge>>,
    rejections: Arc<Vec<Rejection>>,
    blocks: Arc<Vec<Block>>,
    reports: Arc<Vec<Report>>,
    conversations: Arc<Vec<Conversation>>,
    messages: Arc<Vec<Message>>,
    locations: Arc<Vec<SavedLocation>>,
}

/// In-process store for development and tests. Transactions run one at a
/// time on a working snapshot that replaces the live set only when the
/// closure succeeds.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Tables {
        self.tables.lock().unwrap().clone()
    }
}

impl Store for MemoryStore {
    fn run_transaction(&self, f: &mut dyn FnMut(&mut dyn Repo) -> AppResult<()>) -> AppResult<()> {
        let mut live = self
            .tables
            .lock()
            .map_err(|_| AppError::internal("memory store lock poisoned"))?;
        let mut working = live.clone();
        f(&mut working)?;
        *live = working;
        Ok(())
    }

    fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

fn unique_violation(table: &str) -> AppError {
    AppError::internal(format!("duplicate key in {table}"))
}

impl Tables {
    /// Number of rows anywhere that mention `user`.
    #[cfg(test)]
    pub(crate) fn rows_referencing(&self, user: ProfileId) -> usize {
        let conversation_ids: Vec<Uuid> = self
            .conversations
            .iter()
            .filter(|c| c.has_member(user))
            .map(|c| c.id)
            .collect();

        self.profiles.iter().filter(|p| p.id == user).count()
            + self.edges.iter().filter(|e| e.involves(user)).count()
            + self
                .rejections
                .iter()
                .filter(|r| r.user_id == user || r.rejected_user_id == user)
                .count()
            + self
                .blocks
                .iter()
                .filter(|b| b.blocker_id == user || b.blocked_id == user)
                .count()
            + self
                .reports
                .iter()
                .filter(|r| r.reporter_id == user || r.reported_id == user)
                .count()
            + conversation_ids.len()
            + self
                .messages
                .iter()
                .filter(|m| m.sender_id == user || conversation_ids.contains(&m.conversation_id))
                .count()
            + self.locations.iter().filter(|l| l.user_id == user).count()
    }

    #[cfg(test)]
    pub(crate) fn account_count(&self) -> usize {
        self.accounts.len()
    }

    #[cfg(test)]
    pub(crate) fn edges(&self) -> &[Edge] {
        &self.edges
    }

    #[cfg(test)]
    pub(crate) fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    #[cfg(test)]
    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[cfg(test)]
    pub(crate) fn rejections(&self) -> &[Rejection] {
        &self.rejections
    }

    #[cfg(test)]
    pub(crate) fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[cfg(test)]
    pub(crate) fn reports(&self) -> &[Report] {
        &self.reports
    }
}

impl Repo for Tables {
    fn find_account(&mut self, identity_key: &str) -> AppResult<Option<Account>> {
        Ok(self.accounts.iter().find(|a| a.identity_key == identity_key).cloned())
    }

    fn insert_account(&mut self, account: &Account) -> AppResult<()> {
        if self.accounts.iter().any(|a| a.identity_key == account.identity_key) {
            return Err(unique_violation("accounts"));
        }
        Arc::make_mut(&mut self.accounts).push(account.clone());
        Ok(())
    }

    fn delete_account(&mut self, identity_key: &str) -> AppResult<()> {
        Arc::make_mut(&mut self.accounts).retain(|a| a.identity_key != identity_key);
        Ok(())
    }

    fn find_profile(&mut self, id: ProfileId) -> AppResult<Option<Profile>> {
        Ok(self.profiles.iter().find(|p| p.id == id).cloned())
    }

    fn find_profile_by_identity(&mut self, identity_key: &str) -> AppResult<Option<Profile>> {
        Ok(self.profiles.iter().find(|p| p.identity_key == identity_key).cloned())
    }

    fn find_profiles(&mut self, ids: &[ProfileId]) -> AppResult<Vec<Profile>> {
        Ok(self.profiles.iter().filter(|p| ids.contains(&p.id)).cloned().collect())
    }

    fn insert_profile(&mut self, profile: &Profile) -> AppResult<()> {
        if self
            .profiles
            .iter()
            .any(|p| p.id == profile.id || p.identity_key == profile.identity_key)
        {
            return Err(unique_violation("profiles"));
        }
        Arc::make_mut(&mut self.profiles).push(profile.clone());
        Ok(())
    }

    fn update_profile(&mut self, profile: &Profile) -> AppResult<()> {
        let slot = Arc::make_mut(&mut self.profiles)
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or(AppError::Database(diesel::result::Error::NotFound))?;
        *slot = profile.clone();
        Ok(())
    }

    fn delete_profile(&mut self, id: ProfileId) -> AppResult<()> {
        Arc::make_mut(&mut self.profiles).retain(|p| p.id != id);
        Ok(())
    }

    fn candidate_pool(&mut self, gender: Option<&str>) -> AppResult<Vec<Profile>> {
        Ok(self
            .profiles
            .iter()
            .filter(|p| p.is_visible)
            .filter(|p| match gender {
                Some(g) => p.gender.as_deref().is_some_and(|pg| pg.to_lowercase() == g.to_lowercase()),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn find_edge(&mut self, from: ProfileId, to: ProfileId) -> AppResult<Option<Edge>> {
        Ok(self
            .edges
            .iter()
            .find(|e| e.user_a == from && e.user_b == to)
            .cloned())
    }

    fn find_edge_by_id(&mut self, id: Uuid) -> AppResult<Option<Edge>> {
        Ok(self.edges.iter().find(|e| e.id == id).cloned())
    }

    fn insert_edge(&mut self, edge: &Edge) -> AppResult<()> {
        if self
            .edges
            .iter()
            .any(|e| e.id == edge.id || (e.user_a == edge.user_a && e.user_b == edge.user_b))
        {
            return Err(unique_violation("matches"));
        }
        Arc::make_mut(&mut self.edges).push(edge.clone());
        Ok(())
    }

    fn set_edge_status(&mut self, id: Uuid, status: EdgeStatus, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(edge) = Arc::make_mut(&mut self.edges).iter_mut().find(|e| e.id == id) {
            edge.status = status;
            edge.updated_at = at;
        }
        Ok(())
    }

    fn delete_edge(&mut self, id: Uuid) -> AppResult<()> {
        Arc::make_mut(&mut self.edges).retain(|e| e.id != id);
        Ok(())
    }

    fn edges_from(&mut self, user: ProfileId) -> AppResult<Vec<Edge>> {
        Ok(self.edges.iter().filter(|e| e.user_a == user).cloned().collect())
    }

    fn edges_to(&mut self, user: ProfileId) -> AppResult<Vec<Edge>> {
        Ok(self.edges.iter().filter(|e| e.user_b == user).cloned().collect())
    }

    fn delete_edges_involving(&mut self, user: ProfileId) -> AppResult<()> {
        Arc::make_mut(&mut self.edges).retain(|e| !e.involves(user));
        Ok(())
    }

    fn find_rejection(&mut self, user: ProfileId, rejected: ProfileId) -> AppResult<Option<Rejection>> {
        Ok(self
            .rejections
            .iter()
            .find(|r| r.user_id == user && r.rejected_user_id == rejected)
            .cloned())
    }

    fn insert_rejection(&mut self, rejection: &Rejection) -> AppResult<()> {
        if self
            .rejections
            .iter()
            .any(|r| r.user_id == rejection.user_id && r.rejected_user_id == rejection.rejected_user_id)
        {
            return Err(unique_violation("rejections"));
        }
        Arc::make_mut(&mut self.rejections).push(rejection.clone());
        Ok(())
    }

    fn rejected_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(self
            .rejections
            .iter()
            .filter(|r| r.user_id == user)
            .map(|r| r.rejected_user_id)
            .collect())
    }

    fn delete_rejections_involving(&mut self, user: ProfileId) -> AppResult<()> {
        Arc::make_mut(&mut self.rejections)
            .retain(|r| r.user_id != user && r.rejected_user_id != user);
        Ok(())
    }

    fn find_block(&mut self, blocker: ProfileId, blocked: ProfileId) -> AppResult<Option<Block>> {
        Ok(self
            .blocks
            .iter()
            .find(|b| b.blocker_id == blocker && b.blocked_id == blocked)
            .cloned())
    }

    fn insert_block(&mut self, block: &Block) -> AppResult<()> {
        if self
            .blocks
            .iter()
            .any(|b| b.blocker_id == block.blocker_id && b.blocked_id == block.blocked_id)
        {
            return Err(unique_violation("blocks"));
        }
        Arc::make_mut(&mut self.blocks).push(block.clone());
        Ok(())
    }

    fn blocked_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(self
            .blocks
            .iter()
            .filter(|b| b.blocker_id == user)
            .map(|b| b.blocked_id)
            .collect())
    }

    fn blockers_of(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(self
            .blocks
            .iter()
            .filter(|b| b.blocked_id == user)
            .map(|b| b.blocker_id)
            .collect())
    }

    fn delete_blocks_involving(&mut self, user: ProfileId) -> AppResult<()> {
        Arc::make_mut(&mut self.blocks).retain(|b| b.blocker_id != user && b.blocked_id != user);
        Ok(())
    }

    fn insert_report(&mut self, report: &Report) -> AppResult<()> {
        Arc::make_mut(&mut self.reports).push(report.clone());
        Ok(())
    }

    fn reported_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(self
            .reports
            .iter()
            .filter(|r| r.reporter_id == user)
            .map(|r| r.reported_id)
            .collect())
    }

    fn delete_reports_involving(&mut self, user: ProfileId) -> AppResult<()> {
        Arc::make_mut(&mut self.reports)
            .retain(|r| r.reporter_id != user && r.reported_id != user);
        Ok(())
    }

    fn insert_conversation(&mut self, conversation: &Conversation) -> AppResult<()> {
        if self
            .conversations
            .iter()
            .any(|c| c.id == conversation.id || c.match_id == conversation.match_id)
        {
            return Err(unique_violation("conversations"));
        }
        Arc::make_mut(&mut self.conversations).push(conversation.clone());
        Ok(())
    }

    fn find_conversation(&mut self, id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.conversations.iter().find(|c| c.id == id).cloned())
    }

    fn find_conversation_by_match(&mut self, match_id: Uuid) -> AppResult<Option<Conversation>> {
        Ok(self.conversations.iter().find(|c| c.match_id == match_id).cloned())
    }

    fn conversations_for(&mut self, user: ProfileId) -> AppResult<Vec<Conversation>> {
        let mut found: Vec<Conversation> = self
            .conversations
            .iter()
            .filter(|c| c.has_member(user))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(found)
    }

    fn record_last_message(
        &mut self,
        conversation_id: Uuid,
        last: &LastMessage,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        if let Some(conversation) = Arc::make_mut(&mut self.conversations).iter_mut().find(|c| c.id == conversation_id) {
            conversation.last_message = Some(last.clone());
            conversation.last_message_at = at;
        }
        Ok(())
    }

    fn delete_conversation(&mut self, id: Uuid) -> AppResult<()> {
        Arc::make_mut(&mut self.conversations).retain(|c| c.id != id);
        Ok(())
    }

    fn insert_message(&mut self, message: &Message) -> AppResult<()> {
        Arc::make_mut(&mut self.messages).push(message.clone());
        Ok(())
    }

    fn list_messages(&mut self, conversation_id: Uuid, offset: u64, limit: u64) -> AppResult<Vec<Message>> {
        let mut found: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect())
    }

    fn count_messages(&mut self, conversation_id: Uuid) -> AppResult<u64> {
        Ok(self
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .count() as u64)
    }

    fn delete_messages(&mut self, conversation_id: Uuid) -> AppResult<()> {
        Arc::make_mut(&mut self.messages).retain(|m| m.conversation_id != conversation_id);
        Ok(())
    }

    fn insert_location(&mut self, location: &SavedLocation) -> AppResult<()> {
        if self
            .locations
            .iter()
            .any(|l| l.user_id == location.user_id && l.name == location.name)
        {
            return Err(unique_violation("saved_locations"));
        }
        Arc::make_mut(&mut self.locations).push(location.clone());
        Ok(())
    }

    fn find_location(&mut self, id: Uuid) -> AppResult<Option<SavedLocation>> {
        Ok(self.locations.iter().find(|l| l.id == id).cloned())
    }

    fn find_location_by_name(&mut self, user: ProfileId, name: &str) -> AppResult<Option<SavedLocation>> {
        Ok(self
            .locations
            .iter()
            .find(|l| l.user_id == user && l.name == name)
            .cloned())
    }

    fn locations_for(&mut self, user: ProfileId) -> AppResult<Vec<SavedLocation>> {
        Ok(self.locations.iter().filter(|l| l.user_id == user).cloned().collect())
    }

    fn locations_for_users(&mut self, users: &[ProfileId]) -> AppResult<Vec<SavedLocation>> {
        Ok(self
            .locations
            .iter()
            .filter(|l| users.contains(&l.user_id))
            .cloned()
            .collect())
    }

    fn delete_location(&mut self, id: Uuid) -> AppResult<()> {
        Arc::make_mut(&mut self.locations).retain(|l| l.id != id);
        Ok(())
    }

    fn delete_locations_for(&mut self, user: ProfileId) -> AppResult<()> {
        Arc::make_mut(&mut self.locations).retain(|l| l.user_id != user);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::transaction;

    fn edge(a: ProfileId, b: ProfileId) -> Edge {
        let now = Utc::now();
        Edge {
            id: Uuid::now_v7(),
            user_a: a,
            user_b: b,
            status: EdgeStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn failed_transaction_leaves_no_writes() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

        let result: AppResult<()> = transaction(&store, |repo| {
            repo.insert_edge(&edge(a, b))?;
            Err(AppError::bad_request("abort"))
        });
        assert!(result.is_err());
        assert!(store.snapshot().edges().is_empty());

        transaction(&store, |repo| repo.insert_edge(&edge(a, b))).unwrap();
        assert_eq!(store.snapshot().edges().len(), 1);
    }

    #[test]
    fn ordered_pair_is_unique() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        transaction(&store, |repo| repo.insert_edge(&edge(a, b))).unwrap();

        assert!(transaction(&store, |repo| repo.insert_edge(&edge(a, b))).is_err());
        assert!(transaction(&store, |repo| repo.insert_edge(&edge(b, a))).is_ok());
    }

    #[test]
    fn transaction_returns_closure_value() {
        let store = MemoryStore::new();
        let count = transaction(&store, |repo| repo.count_messages(Uuid::nil())).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn reads_share_tables_and_writes_copy_only_what_they_touch() {
        let store = MemoryStore::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        transaction(&store, |repo| repo.insert_edge(&edge(a, b))).unwrap();
        let before = store.snapshot();

        transaction(&store, |repo| repo.edges_from(a)).unwrap();
        let after_read = store.snapshot();
        assert!(Arc::ptr_eq(&before.edges, &after_read.edges));

        transaction(&store, |repo| repo.insert_edge(&edge(b, a))).unwrap();
        let after_write = store.snapshot();
        assert!(!Arc::ptr_eq(&before.edges, &after_write.edges));
        assert!(Arc::ptr_eq(&before.profiles, &after_write.profiles));
        assert_eq!(before.edges().len(), 1);
        assert_eq!(after_write.edges().len(), 2);
    }
}
