use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use kindred_shared::clients::db::DbPool;
use kindred_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{
    Account, Block, Conversation, DatingPreferences, Edge, EdgeStatus, LastMessage, Message,
    MessageType, Profile, ProfileId, Rejection, Report, SavedLocation,
};
use crate::schema::{
    accounts, blocks, conversations, matches, messages, profiles, rejections, reports,
    saved_locations,
};
use crate::store::{Repo, Store};

diesel::sql_function! {
    fn lower(x: diesel::sql_types::Nullable<diesel::sql_types::Text>) -> diesel::sql_types::Nullable<diesel::sql_types::Text>;
}

/// Postgres store. Every transaction runs at SERIALIZABLE isolation and is
/// re-run on serialization failures and unique-index races.
pub struct PgStore {
    pool: DbPool,
    max_attempts: u32,
}

impl PgStore {
    pub fn new(pool: DbPool, max_attempts: u32) -> Self {
        Self {
            pool,
            max_attempts: max_attempts.max(1),
        }
    }

    fn connection(&self) -> AppResult<kindred_shared::clients::db::DbConn> {
        self.pool.get().map_err(|e| {
            AppError::new(ErrorCode::ServiceUnavailable, format!("database unavailable: {e}"))
        })
    }
}

fn is_retryable(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::UniqueViolation,
            _,
        ))
    )
}

impl Store for PgStore {
    fn run_transaction(&self, f: &mut dyn FnMut(&mut dyn Repo) -> AppResult<()>) -> AppResult<()> {
        let mut conn = self.connection()?;
        let mut attempt = 1;
        loop {
            let result = conn
                .build_transaction()
                .serializable()
                .run(|tx: &mut PgConnection| f(tx));

            match result {
                Err(e) if attempt < self.max_attempts && is_retryable(&e) => {
                    tracing::debug!(attempt, error = %e, "transaction conflict, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> AppResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

fn from_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(value).map_err(|e| AppError::Internal(e.into()))
}

// --- Rows ---

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = accounts)]
struct AccountRow {
    id: Uuid,
    identity_key: String,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            identity_key: row.identity_key,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Queryable, Insertable, AsChangeset)]
#[diesel(table_name = profiles, treat_none_as_null = true)]
struct ProfileRow {
    id: Uuid,
    identity_key: String,
    name: Option<String>,
    age: Option<i32>,
    gender: Option<String>,
    sexuality: Option<String>,
    bio: Option<String>,
    occupation: Option<String>,
    religion: Option<String>,
    location: Option<String>,
    university: Option<String>,
    political_leaning: Option<String>,
    dating_intentions: Option<String>,
    height_cm: Option<i32>,
    photos: serde_json::Value,
    activities: serde_json::Value,
    activities_updated_at: Option<DateTime<Utc>>,
    dating_preferences: serde_json::Value,
    push_token: Option<String>,
    onboarding_complete: bool,
    is_visible: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProfileRow {
    fn from_profile(p: &Profile) -> AppResult<Self> {
        Ok(Self {
            id: p.id,
            identity_key: p.identity_key.clone(),
            name: p.name.clone(),
            age: p.age,
            gender: p.gender.clone(),
            sexuality: p.sexuality.clone(),
            bio: p.bio.clone(),
            occupation: p.occupation.clone(),
            religion: p.religion.clone(),
            location: p.location.clone(),
            university: p.university.clone(),
            political_leaning: p.political_leaning.clone(),
            dating_intentions: p.dating_intentions.clone(),
            height_cm: p.height_cm,
            photos: to_json(&p.photos)?,
            activities: to_json(&p.activities)?,
            activities_updated_at: p.activities_updated_at,
            dating_preferences: to_json(&p.dating_preferences)?,
            push_token: p.push_token.clone(),
            onboarding_complete: p.onboarding_complete,
            is_visible: p.is_visible,
            created_at: p.created_at,
            updated_at: p.updated_at,
        })
    }

    fn into_profile(self) -> AppResult<Profile> {
        let dating_preferences: DatingPreferences = from_json(self.dating_preferences)?;
        Ok(Profile {
            id: self.id,
            identity_key: self.identity_key,
            name: self.name,
            age: self.age,
            gender: self.gender,
            sexuality: self.sexuality,
            bio: self.bio,
            occupation: self.occupation,
            religion: self.religion,
            location: self.location,
            university: self.university,
            political_leaning: self.political_leaning,
            dating_intentions: self.dating_intentions,
            height_cm: self.height_cm,
            photos: from_json(self.photos)?,
            activities: from_json(self.activities)?,
            activities_updated_at: self.activities_updated_at,
            dating_preferences,
            push_token: self.push_token,
            onboarding_complete: self.onboarding_complete,
            is_visible: self.is_visible,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn into_profiles(rows: Vec<ProfileRow>) -> AppResult<Vec<Profile>> {
    rows.into_iter().map(ProfileRow::into_profile).collect()
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = matches)]
struct EdgeRow {
    id: Uuid,
    user_a: Uuid,
    user_b: Uuid,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EdgeRow {
    fn into_edge(self) -> AppResult<Edge> {
        let status = EdgeStatus::parse(&self.status)
            .ok_or_else(|| AppError::internal(format!("unknown match status '{}'", self.status)))?;
        Ok(Edge {
            id: self.id,
            user_a: self.user_a,
            user_b: self.user_b,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn into_edges(rows: Vec<EdgeRow>) -> AppResult<Vec<Edge>> {
    rows.into_iter().map(EdgeRow::into_edge).collect()
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = rejections)]
struct RejectionRow {
    id: Uuid,
    user_id: Uuid,
    rejected_user_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = blocks)]
struct BlockRow {
    id: Uuid,
    blocker_id: Uuid,
    blocked_id: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reports)]
struct ReportRow<'a> {
    id: Uuid,
    reporter_id: Uuid,
    reported_id: Uuid,
    reason: &'a str,
    description: Option<&'a str>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = conversations)]
struct ConversationRow {
    id: Uuid,
    match_id: Uuid,
    user1_id: Uuid,
    user2_id: Uuid,
    last_message_content: Option<String>,
    last_message_sender_id: Option<Uuid>,
    last_message_type: Option<String>,
    last_message_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<&Conversation> for ConversationRow {
    fn from(c: &Conversation) -> Self {
        let last = c.last_message.as_ref();
        Self {
            id: c.id,
            match_id: c.match_id,
            user1_id: c.user1_id,
            user2_id: c.user2_id,
            last_message_content: last.map(|l| l.content.clone()),
            last_message_sender_id: last.map(|l| l.sender_id),
            last_message_type: last.map(|l| l.message_type.as_str().to_string()),
            last_message_at: c.last_message_at,
            created_at: c.created_at,
        }
    }
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        let last_message = match (row.last_message_content, row.last_message_sender_id) {
            (Some(content), Some(sender_id)) => Some(LastMessage {
                content,
                sender_id,
                message_type: row
                    .last_message_type
                    .as_deref()
                    .and_then(MessageType::parse)
                    .unwrap_or_default(),
            }),
            _ => None,
        };
        Self {
            id: row.id,
            match_id: row.match_id,
            user1_id: row.user1_id,
            user2_id: row.user2_id,
            last_message,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = messages)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: Uuid,
    content: String,
    message_type: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            content: row.content,
            message_type: MessageType::parse(&row.message_type).unwrap_or_default(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = saved_locations)]
struct LocationRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    latitude: f64,
    longitude: f64,
    geohash: String,
    category: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<LocationRow> for SavedLocation {
    fn from(row: LocationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            geohash: row.geohash,
            category: row.category,
            address: row.address,
            created_at: row.created_at,
        }
    }
}

impl From<&SavedLocation> for LocationRow {
    fn from(l: &SavedLocation) -> Self {
        Self {
            id: l.id,
            user_id: l.user_id,
            name: l.name.clone(),
            latitude: l.latitude,
            longitude: l.longitude,
            geohash: l.geohash.clone(),
            category: l.category.clone(),
            address: l.address.clone(),
            created_at: l.created_at,
        }
    }
}

// --- Repo ---

impl Repo for PgConnection {
    fn find_account(&mut self, identity_key: &str) -> AppResult<Option<Account>> {
        let row = accounts::table
            .filter(accounts::identity_key.eq(identity_key))
            .first::<AccountRow>(self)
            .optional()?;
        Ok(row.map(Account::from))
    }

    fn insert_account(&mut self, account: &Account) -> AppResult<()> {
        diesel::insert_into(accounts::table)
            .values(AccountRow {
                id: account.id,
                identity_key: account.identity_key.clone(),
                created_at: account.created_at,
            })
            .execute(self)?;
        Ok(())
    }

    fn delete_account(&mut self, identity_key: &str) -> AppResult<()> {
        diesel::delete(accounts::table.filter(accounts::identity_key.eq(identity_key)))
            .execute(self)?;
        Ok(())
    }

    fn find_profile(&mut self, id: ProfileId) -> AppResult<Option<Profile>> {
        profiles::table
            .find(id)
            .first::<ProfileRow>(self)
            .optional()?
            .map(ProfileRow::into_profile)
            .transpose()
    }

    fn find_profile_by_identity(&mut self, identity_key: &str) -> AppResult<Option<Profile>> {
        profiles::table
            .filter(profiles::identity_key.eq(identity_key))
            .first::<ProfileRow>(self)
            .optional()?
            .map(ProfileRow::into_profile)
            .transpose()
    }

    fn find_profiles(&mut self, ids: &[ProfileId]) -> AppResult<Vec<Profile>> {
        let rows = profiles::table
            .filter(profiles::id.eq_any(ids))
            .load::<ProfileRow>(self)?;
        into_profiles(rows)
    }

    fn insert_profile(&mut self, profile: &Profile) -> AppResult<()> {
        diesel::insert_into(profiles::table)
            .values(ProfileRow::from_profile(profile)?)
            .execute(self)?;
        Ok(())
    }

    fn update_profile(&mut self, profile: &Profile) -> AppResult<()> {
        let row = ProfileRow::from_profile(profile)?;
        diesel::update(profiles::table.find(profile.id))
            .set(&row)
            .execute(self)?;
        Ok(())
    }

    fn delete_profile(&mut self, id: ProfileId) -> AppResult<()> {
        diesel::delete(profiles::table.find(id)).execute(self)?;
        Ok(())
    }

    fn candidate_pool(&mut self, gender: Option<&str>) -> AppResult<Vec<Profile>> {
        let mut query = profiles::table
            .filter(profiles::is_visible.eq(true))
            .order((profiles::created_at.asc(), profiles::id.asc()))
            .into_boxed();
        if let Some(gender) = gender {
            query = query.filter(lower(profiles::gender).eq(gender.to_lowercase()));
        }
        into_profiles(query.load::<ProfileRow>(self)?)
    }

    fn find_edge(&mut self, from: ProfileId, to: ProfileId) -> AppResult<Option<Edge>> {
        matches::table
            .filter(matches::user_a.eq(from))
            .filter(matches::user_b.eq(to))
            .first::<EdgeRow>(self)
            .optional()?
            .map(EdgeRow::into_edge)
            .transpose()
    }

    fn find_edge_by_id(&mut self, id: Uuid) -> AppResult<Option<Edge>> {
        matches::table
            .find(id)
            .first::<EdgeRow>(self)
            .optional()?
            .map(EdgeRow::into_edge)
            .transpose()
    }

    fn insert_edge(&mut self, edge: &Edge) -> AppResult<()> {
        diesel::insert_into(matches::table)
            .values(EdgeRow {
                id: edge.id,
                user_a: edge.user_a,
                user_b: edge.user_b,
                status: edge.status.as_str().to_string(),
                created_at: edge.created_at,
                updated_at: edge.updated_at,
            })
            .execute(self)?;
        Ok(())
    }

    fn set_edge_status(&mut self, id: Uuid, status: EdgeStatus, at: DateTime<Utc>) -> AppResult<()> {
        diesel::update(matches::table.find(id))
            .set((matches::status.eq(status.as_str()), matches::updated_at.eq(at)))
            .execute(self)?;
        Ok(())
    }

    fn delete_edge(&mut self, id: Uuid) -> AppResult<()> {
        diesel::delete(matches::table.find(id)).execute(self)?;
        Ok(())
    }

    fn edges_from(&mut self, user: ProfileId) -> AppResult<Vec<Edge>> {
        let rows = matches::table
            .filter(matches::user_a.eq(user))
            .order(matches::created_at.asc())
            .load::<EdgeRow>(self)?;
        into_edges(rows)
    }

    fn edges_to(&mut self, user: ProfileId) -> AppResult<Vec<Edge>> {
        let rows = matches::table
            .filter(matches::user_b.eq(user))
            .order(matches::created_at.asc())
            .load::<EdgeRow>(self)?;
        into_edges(rows)
    }

    fn delete_edges_involving(&mut self, user: ProfileId) -> AppResult<()> {
        diesel::delete(matches::table.filter(matches::user_a.eq(user).or(matches::user_b.eq(user))))
            .execute(self)?;
        Ok(())
    }

    fn find_rejection(&mut self, user: ProfileId, rejected: ProfileId) -> AppResult<Option<Rejection>> {
        let row = rejections::table
            .filter(rejections::user_id.eq(user))
            .filter(rejections::rejected_user_id.eq(rejected))
            .first::<RejectionRow>(self)
            .optional()?;
        Ok(row.map(|r| Rejection {
            id: r.id,
            user_id: r.user_id,
            rejected_user_id: r.rejected_user_id,
            created_at: r.created_at,
        }))
    }

    fn insert_rejection(&mut self, rejection: &Rejection) -> AppResult<()> {
        diesel::insert_into(rejections::table)
            .values(RejectionRow {
                id: rejection.id,
                user_id: rejection.user_id,
                rejected_user_id: rejection.rejected_user_id,
                created_at: rejection.created_at,
            })
            .execute(self)?;
        Ok(())
    }

    fn rejected_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(rejections::table
            .filter(rejections::user_id.eq(user))
            .select(rejections::rejected_user_id)
            .load::<Uuid>(self)?)
    }

    fn delete_rejections_involving(&mut self, user: ProfileId) -> AppResult<()> {
        diesel::delete(
            rejections::table.filter(
                rejections::user_id
                    .eq(user)
                    .or(rejections::rejected_user_id.eq(user)),
            ),
        )
        .execute(self)?;
        Ok(())
    }

    fn find_block(&mut self, blocker: ProfileId, blocked: ProfileId) -> AppResult<Option<Block>> {
        let row = blocks::table
            .filter(blocks::blocker_id.eq(blocker))
            .filter(blocks::blocked_id.eq(blocked))
            .first::<BlockRow>(self)
            .optional()?;
        Ok(row.map(|b| Block {
            id: b.id,
            blocker_id: b.blocker_id,
            blocked_id: b.blocked_id,
            created_at: b.created_at,
        }))
    }

    fn insert_block(&mut self, block: &Block) -> AppResult<()> {
        diesel::insert_into(blocks::table)
            .values(BlockRow {
                id: block.id,
                blocker_id: block.blocker_id,
                blocked_id: block.blocked_id,
                created_at: block.created_at,
            })
            .execute(self)?;
        Ok(())
    }

    fn blocked_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(blocks::table
            .filter(blocks::blocker_id.eq(user))
            .select(blocks::blocked_id)
            .load::<Uuid>(self)?)
    }

    fn blockers_of(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(blocks::table
            .filter(blocks::blocked_id.eq(user))
            .select(blocks::blocker_id)
            .load::<Uuid>(self)?)
    }

    fn delete_blocks_involving(&mut self, user: ProfileId) -> AppResult<()> {
        diesel::delete(blocks::table.filter(blocks::blocker_id.eq(user).or(blocks::blocked_id.eq(user))))
            .execute(self)?;
        Ok(())
    }

    fn insert_report(&mut self, report: &Report) -> AppResult<()> {
        diesel::insert_into(reports::table)
            .values(ReportRow {
                id: report.id,
                reporter_id: report.reporter_id,
                reported_id: report.reported_id,
                reason: &report.reason,
                description: report.description.as_deref(),
                created_at: report.created_at,
            })
            .execute(self)?;
        Ok(())
    }

    fn reported_by(&mut self, user: ProfileId) -> AppResult<Vec<ProfileId>> {
        Ok(reports::table
            .filter(reports::reporter_id.eq(user))
            .select(reports::reported_id)
            .load::<Uuid>(self)?)
    }

    fn delete_reports_involving(&mut self, user: ProfileId) -> AppResult<()> {
        diesel::delete(
            reports::table.filter(reports::reporter_id.eq(user).or(reports::reported_id.eq(user))),
        )
        .execute(self)?;
        Ok(())
    }

    fn insert_conversation(&mut self, conversation: &Conversation) -> AppResult<()> {
        diesel::insert_into(conversations::table)
            .values(ConversationRow::from(conversation))
            .execute(self)?;
        Ok(())
    }

    fn find_conversation(&mut self, id: Uuid) -> AppResult<Option<Conversation>> {
        let row = conversations::table
            .find(id)
            .first::<ConversationRow>(self)
            .optional()?;
        Ok(row.map(Conversation::from))
    }

    fn find_conversation_by_match(&mut self, match_id: Uuid) -> AppResult<Option<Conversation>> {
        let row = conversations::table
            .filter(conversations::match_id.eq(match_id))
            .first::<ConversationRow>(self)
            .optional()?;
        Ok(row.map(Conversation::from))
    }

    fn conversations_for(&mut self, user: ProfileId) -> AppResult<Vec<Conversation>> {
        let rows = conversations::table
            .filter(conversations::user1_id.eq(user).or(conversations::user2_id.eq(user)))
            .order(conversations::last_message_at.desc())
            .load::<ConversationRow>(self)?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    fn record_last_message(
        &mut self,
        conversation_id: Uuid,
        last: &LastMessage,
        at: DateTime<Utc>,
    ) -> AppResult<()> {
        diesel::update(conversations::table.find(conversation_id))
            .set((
                conversations::last_message_content.eq(Some(&last.content)),
                conversations::last_message_sender_id.eq(Some(last.sender_id)),
                conversations::last_message_type.eq(Some(last.message_type.as_str())),
                conversations::last_message_at.eq(at),
            ))
            .execute(self)?;
        Ok(())
    }

    fn delete_conversation(&mut self, id: Uuid) -> AppResult<()> {
        diesel::delete(conversations::table.find(id)).execute(self)?;
        Ok(())
    }

    fn insert_message(&mut self, message: &Message) -> AppResult<()> {
        diesel::insert_into(messages::table)
            .values(MessageRow {
                id: message.id,
                conversation_id: message.conversation_id,
                sender_id: message.sender_id,
                content: message.content.clone(),
                message_type: message.message_type.as_str().to_string(),
                created_at: message.created_at,
            })
            .execute(self)?;
        Ok(())
    }

    fn list_messages(&mut self, conversation_id: Uuid, offset: u64, limit: u64) -> AppResult<Vec<Message>> {
        let rows = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .order((messages::created_at.asc(), messages::id.asc()))
            .offset(i64::try_from(offset).unwrap_or(i64::MAX))
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .load::<MessageRow>(self)?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    fn count_messages(&mut self, conversation_id: Uuid) -> AppResult<u64> {
        let count: i64 = messages::table
            .filter(messages::conversation_id.eq(conversation_id))
            .count()
            .get_result(self)?;
        Ok(count as u64)
    }

    fn delete_messages(&mut self, conversation_id: Uuid) -> AppResult<()> {
        diesel::delete(messages::table.filter(messages::conversation_id.eq(conversation_id)))
            .execute(self)?;
        Ok(())
    }

    fn insert_location(&mut self, location: &SavedLocation) -> AppResult<()> {
        diesel::insert_into(saved_locations::table)
            .values(LocationRow::from(location))
            .execute(self)?;
        Ok(())
    }

    fn find_location(&mut self, id: Uuid) -> AppResult<Option<SavedLocation>> {
        let row = saved_locations::table
            .find(id)
            .first::<LocationRow>(self)
            .optional()?;
        Ok(row.map(SavedLocation::from))
    }

    fn find_location_by_name(&mut self, user: ProfileId, name: &str) -> AppResult<Option<SavedLocation>> {
        let row = saved_locations::table
            .filter(saved_locations::user_id.eq(user))
            .filter(saved_locations::name.eq(name))
            .first::<LocationRow>(self)
            .optional()?;
        Ok(row.map(SavedLocation::from))
    }

    fn locations_for(&mut self, user: ProfileId) -> AppResult<Vec<SavedLocation>> {
        let rows = saved_locations::table
            .filter(saved_locations::user_id.eq(user))
            .order(saved_locations::created_at.asc())
            .load::<LocationRow>(self)?;
        Ok(rows.into_iter().map(SavedLocation::from).collect())
    }

    fn locations_for_users(&mut self, users: &[ProfileId]) -> AppResult<Vec<SavedLocation>> {
        let rows = saved_locations::table
            .filter(saved_locations::user_id.eq_any(users))
            .load::<LocationRow>(self)?;
        Ok(rows.into_iter().map(SavedLocation::from).collect())
    }

    fn delete_location(&mut self, id: Uuid) -> AppResult<()> {
        diesel::delete(saved_locations::table.find(id)).execute(self)?;
        Ok(())
    }

    fn delete_locations_for(&mut self, user: ProfileId) -> AppResult<()> {
        diesel::delete(saved_locations::table.filter(saved_locations::user_id.eq(user)))
            .execute(self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicts_are_retried() {
        let conflict = AppError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::SerializationFailure,
            Box::new("could not serialize access".to_string()),
        ));
        let duplicate = AppError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("duplicate key".to_string()),
        ));
        assert!(is_retryable(&conflict));
        assert!(is_retryable(&duplicate));
        assert!(!is_retryable(&AppError::Database(DieselError::NotFound)));
        assert!(!is_retryable(&AppError::bad_request("nope")));
    }

    #[test]
    fn conversation_snapshot_survives_row_mapping() {
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            match_id: Uuid::now_v7(),
            user1_id: Uuid::now_v7(),
            user2_id: Uuid::now_v7(),
            last_message: Some(LastMessage {
                content: "https://cdn.test/a.jpg".into(),
                sender_id: Uuid::nil(),
                message_type: MessageType::Image,
            }),
            last_message_at: now,
            created_at: now,
        };
        let back = Conversation::from(ConversationRow::from(&conversation));
        assert_eq!(back, conversation);
    }

    #[test]
    fn profile_json_columns_round_trip() {
        let mut profile = Profile::empty(Uuid::now_v7(), "auth0|pg", Utc::now());
        profile.photos = vec!["https://cdn.test/1.jpg".into()];
        profile.activities = vec!["bouldering".into()];
        profile.dating_preferences.interested_in = Some("woman".into());

        let row = ProfileRow::from_profile(&profile).unwrap();
        assert_eq!(row.into_profile().unwrap(), profile);
    }
}
