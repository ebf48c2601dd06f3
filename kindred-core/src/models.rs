use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub type ProfileId = Uuid;

// --- Account ---

/// Link between an external identity and the profile created for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub identity_key: String,
    pub created_at: DateTime<Utc>,
}

// --- Profile ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_age_range"))]
pub struct DatingPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 18, max = 120))]
    pub age_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 18, max = 120))]
    pub age_max: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 1000))]
    pub max_distance_km: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interested_in: Option<String>,
    #[serde(default)]
    pub religions: Vec<String>,
}

fn validate_age_range(prefs: &DatingPreferences) -> Result<(), ValidationError> {
    match (prefs.age_min, prefs.age_max) {
        (Some(min), Some(max)) if min > max => Err(ValidationError::new("age_min_exceeds_age_max")),
        _ => Ok(()),
    }
}

impl DatingPreferences {
    /// Gender the candidate pool is restricted to, or `None` for everyone.
    pub fn gender_filter(&self) -> Option<&str> {
        let value = self.interested_in.as_deref()?.trim();
        if value.is_empty() || ["everyone", "any", "all"].iter().any(|w| value.eq_ignore_ascii_case(w)) {
            return None;
        }
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: ProfileId,
    #[serde(skip_serializing)]
    pub identity_key: String,
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub sexuality: Option<String>,
    pub bio: Option<String>,
    pub occupation: Option<String>,
    pub religion: Option<String>,
    pub location: Option<String>,
    pub university: Option<String>,
    pub political_leaning: Option<String>,
    pub dating_intentions: Option<String>,
    pub height_cm: Option<i32>,
    pub photos: Vec<String>,
    pub activities: Vec<String>,
    pub activities_updated_at: Option<DateTime<Utc>>,
    pub dating_preferences: DatingPreferences,
    #[serde(skip_serializing)]
    pub push_token: Option<String>,
    pub onboarding_complete: bool,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Blank profile for a freshly linked identity.
    pub fn empty(id: ProfileId, identity_key: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            identity_key: identity_key.to_string(),
            name: None,
            age: None,
            gender: None,
            sexuality: None,
            bio: None,
            occupation: None,
            religion: None,
            location: None,
            university: None,
            political_leaning: None,
            dating_intentions: None,
            height_cm: None,
            photos: Vec::new(),
            activities: Vec::new(),
            activities_updated_at: None,
            dating_preferences: DatingPreferences::default(),
            push_token: None,
            onboarding_complete: false,
            is_visible: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile update. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfilePatch {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    #[validate(range(min = 18, max = 120, message = "must be at least 18"))]
    pub age: Option<i32>,
    #[validate(length(max = 32))]
    pub gender: Option<String>,
    #[validate(length(max = 32))]
    pub sexuality: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    pub occupation: Option<String>,
    pub religion: Option<String>,
    pub location: Option<String>,
    pub university: Option<String>,
    pub political_leaning: Option<String>,
    pub dating_intentions: Option<String>,
    #[validate(range(min = 90, max = 250))]
    pub height_cm: Option<i32>,
    #[validate(length(max = 6))]
    pub photos: Option<Vec<String>>,
    #[validate(length(max = 3), custom = "validate_activities")]
    pub activities: Option<Vec<String>>,
    #[validate]
    pub dating_preferences: Option<DatingPreferences>,
    pub push_token: Option<String>,
    pub onboarding_complete: Option<bool>,
    pub is_visible: Option<bool>,
}

fn validate_activities(activities: &Vec<String>) -> Result<(), ValidationError> {
    if activities.iter().any(|a| a.trim().is_empty()) {
        return Err(ValidationError::new("empty_activity"));
    }
    Ok(())
}

/// Result of looking at someone else's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileView {
    Visible(Profile),
    Hidden { reason: HiddenReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenReason {
    OwnProfile,
    Blocked,
    NotVisible,
}

// --- Relationship graph ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Pending,
    Accepted,
    Rejected,
}

impl EdgeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Directed like edge `user_a -> user_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub id: Uuid,
    pub user_a: ProfileId,
    pub user_b: ProfileId,
    pub status: EdgeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(user_a: ProfileId, user_b: ProfileId, status: EdgeStatus, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_a,
            user_b,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn involves(&self, user: ProfileId) -> bool {
        self.user_a == user || self.user_b == user
    }

    pub fn counterpart(&self, user: ProfileId) -> Option<ProfileId> {
        if self.user_a == user {
            Some(self.user_b)
        } else if self.user_b == user {
            Some(self.user_a)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub id: Uuid,
    pub user_id: ProfileId,
    pub rejected_user_id: ProfileId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    pub id: Uuid,
    pub blocker_id: ProfileId,
    pub blocked_id: ProfileId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: ProfileId,
    pub reported_id: ProfileId,
    pub reason: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LikeOutcome {
    Pending { match_id: Uuid },
    Matched { match_id: Uuid, conversation_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    pub report_id: Uuid,
    pub blocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub conversation_id: Option<Uuid>,
    pub profile: Profile,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IncomingLike {
    pub match_id: Uuid,
    pub profile: Profile,
    pub liked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub profile: Profile,
    pub shared_locations: Vec<String>,
    pub tier: u8,
}

// --- Conversations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastMessage {
    pub content: String,
    pub sender_id: ProfileId,
    pub message_type: MessageType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub match_id: Uuid,
    pub user1_id: ProfileId,
    pub user2_id: ProfileId,
    pub last_message: Option<LastMessage>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn has_member(&self, user: ProfileId) -> bool {
        self.user1_id == user || self.user2_id == user
    }

    pub fn peer_of(&self, user: ProfileId) -> Option<ProfileId> {
        if self.user1_id == user {
            Some(self.user2_id)
        } else if self.user2_id == user {
            Some(self.user1_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: ProfileId,
    pub content: String,
    pub message_type: MessageType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub conversation: Conversation,
    pub peer: Profile,
}

// --- Locations ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedLocation {
    pub id: Uuid,
    pub user_id: ProfileId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub geohash: String,
    pub category: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewLocation {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[validate(length(max = 50))]
    pub category: Option<String>,
    pub address: Option<String>,
}
