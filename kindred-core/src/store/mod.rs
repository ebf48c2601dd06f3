//! Transactional storage port.
//!
//! Core operations run their whole read-check-write sequence against a
//! [`Repo`] handed out by [`Store::run_transaction`]. An error returned from
//! the closure aborts the transaction, and adapters may re-run the closure
//! when the backend reports a serialization conflict, so closures must not
//! have side effects outside the repo.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult};

use crate::models::{
    Account, Block, Conversation, Edge, EdgeStatus, LastMessage, Message, Profile, ProfileId,
    Rejection, Report, SavedLocation,
};

pub mod memory;
pub mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

pub trait Repo {
    // --- accounts ---
    fn find_account(&mut self, identity_key: &str) -> AppResult<Option<Account>>;
    fn insert_account(&mut self, account: &Account) -> AppResult<()>;
    fn delete_account(&mut self, identity_key: &str) -> AppResult<()>;

    // --- profiles ---
    fn find_profile(&mut self, id: ProfileId) -> AppResult<Option<Profile>>;
    fn find_profile_by_identity(&mut self, identity_key: &str) -> AppResult<Option<Profile>>;
    /// Profiles for the given ids, in no particular order. Missing ids are skipped.
    fn find_profiles(&mut self, ids: &[ProfileId]) -> AppResult<Vec<Profile>>;
    fn insert_profile(&mut self, profile: &Profile) -> AppResult<()>;
    fn update_profile(&mut self, profile: &Profile) -> AppResult<()>;
    fn delete_profile(&mut self, id: ProfileId) -> AppResult<()>;
    /// Visible profiles in creation order, optionally restricted to one gender.
    fn candidate_pool(&mut self, gender: Option<&str>) -> AppResult<Vec<Profile>>;

    // --- like edges ---
    fn find_edge(&mut self, from: ProfileId, to: ProfileId) -> AppResult<Option<Edge>>;
    fn find_edge_by_id(&mut self, id: Uuid) -> AppResult<Option<Edge>>;
    fn insert_edge(&mut self, edge: &Edge) -> AppResult<()>;
    fn set_edge_status(&mut self, id: Uuid, status: EdgeStatus, at: DateTime<Utc>) -> AppResult<()>;
    fn delete_edge(&mut self, id: Uuid) -> AppResult<()>;
    fn edges_from(&mut self, user: ProfileId) -> AppResult<Vec<Edge>>;
    fn edges_to(&mut self, user: ProfileId) -> AppResult<Vec<Edge>>;
    fn delete_edges_involving(&mut self, user: ProfileId) -> AppResult<()>;

    // --- rejections ---
    fn find_rejection(&mut self, user: ProfileId, rejected: ProfileId) -> AppResult<Option<Rejection>>;
    fn insert_rejection(&mut self, rejection: &Rejection) -> AppResult<()>;
    fn rejected_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>>;
    fn delete_rejections_involving(&mut self, user: ProfileId) -> AppResult<()>;

    // --- blocks ---
    fn find_block(&mut self, blocker: ProfileId, blocked: ProfileId) -> AppResult<Option<Block>>;
    fn insert_block(&mut self, block: &Block) -> AppResult<()>;
    /// Users `user` has blocked.
    fn blocked_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>>;
    /// Users who have blocked `user`.
    fn blockers_of(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>>;
    fn delete_blocks_involving(&mut self, user: ProfileId) -> AppResult<()>;

    // --- reports ---
    fn insert_report(&mut self, report: &Report) -> AppResult<()>;
    fn reported_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>>;
    fn delete_reports_involving(&mut self, user: ProfileId) -> AppResult<()>;

    // --- conversations ---
    fn insert_conversation(&mut self, conversation: &Conversation) -> AppResult<()>;
    fn find_conversation(&mut self, id: Uuid) -> AppResult<Option<Conversation>>;
    fn find_conversation_by_match(&mut self, match_id: Uuid) -> AppResult<Option<Conversation>>;
    /// Conversations the user takes part in, most recent activity first.
    fn conversations_for(&mut self, user: ProfileId) -> AppResult<Vec<Conversation>>;
    fn record_last_message(
        &mut self,
        conversation_id: Uuid,
        last: &LastMessage,
        at: DateTime<Utc>,
    ) -> AppResult<()>;
    fn delete_conversation(&mut self, id: Uuid) -> AppResult<()>;

    // --- messages ---
    fn insert_message(&mut self, message: &Message) -> AppResult<()>;
    /// Oldest first.
    fn list_messages(&mut self, conversation_id: Uuid, offset: u64, limit: u64) -> AppResult<Vec<Message>>;
    fn count_messages(&mut self, conversation_id: Uuid) -> AppResult<u64>;
    fn delete_messages(&mut self, conversation_id: Uuid) -> AppResult<()>;

    // --- saved locations ---
    fn insert_location(&mut self, location: &SavedLocation) -> AppResult<()>;
    fn find_location(&mut self, id: Uuid) -> AppResult<Option<SavedLocation>>;
    fn find_location_by_name(&mut self, user: ProfileId, name: &str) -> AppResult<Option<SavedLocation>>;
    fn locations_for(&mut self, user: ProfileId) -> AppResult<Vec<SavedLocation>>;
    fn locations_for_users(&mut self, users: &[ProfileId]) -> AppResult<Vec<SavedLocation>>;
    fn delete_location(&mut self, id: Uuid) -> AppResult<()>;
    fn delete_locations_for(&mut self, user: ProfileId) -> AppResult<()>;
}

pub trait Store: Send + Sync {
    /// Runs `f` atomically. `Err` from `f` rolls back everything it wrote.
    fn run_transaction(&self, f: &mut dyn FnMut(&mut dyn Repo) -> AppResult<()>) -> AppResult<()>;

    /// Cheap connectivity probe for health checks.
    fn ping(&self) -> AppResult<()>;
}

/// Typed wrapper over [`Store::run_transaction`].
pub fn transaction<T>(
    store: &dyn Store,
    mut f: impl FnMut(&mut dyn Repo) -> AppResult<T>,
) -> AppResult<T> {
    let mut output = None;
    store.run_transaction(&mut |repo| {
        output = Some(f(repo)?);
        Ok(())
    })?;
    output.ok_or_else(|| AppError::internal("transaction finished without a result"))
}
