use chrono::{DateTime, Utc};
use uuid::Uuid;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::auth::IdentityResolver;

use crate::models::{Account, Profile, ProfileId};
use crate::services::Core;
use crate::store::Repo;

/// The caller's identity key, or an authentication error when there is none.
pub fn require_identity(auth: &dyn IdentityResolver) -> AppResult<&str> {
    auth.identity()
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| AppError::unauthenticated("authentication required"))
}

pub(crate) fn profile_not_found() -> AppError {
    AppError::new(ErrorCode::ProfileNotFound, "profile not found")
}

/// Profile owned by `identity`. Callers that have never upserted a profile
/// get `ProfileNotFound`.
pub(crate) fn caller_profile(repo: &mut dyn Repo, identity: &str) -> AppResult<Profile> {
    repo.find_profile_by_identity(identity)?
        .ok_or_else(profile_not_found)
}

/// Links the identity to an account and a blank profile on first use.
pub(crate) fn ensure_profile(
    repo: &mut dyn Repo,
    identity: &str,
    now: DateTime<Utc>,
) -> AppResult<Profile> {
    if let Some(profile) = repo.find_profile_by_identity(identity)? {
        return Ok(profile);
    }

    if repo.find_account(identity)?.is_none() {
        repo.insert_account(&Account {
            id: Uuid::now_v7(),
            identity_key: identity.to_string(),
            created_at: now,
        })?;
    }

    let profile = Profile::empty(Uuid::now_v7(), identity, now);
    repo.insert_profile(&profile)?;
    tracing::info!(profile_id = %profile.id, "profile created for new identity");
    Ok(profile)
}

impl Core {
    /// Profile id of the caller, if a profile exists yet.
    pub fn current_profile_id(&self, auth: &dyn IdentityResolver) -> AppResult<Option<ProfileId>> {
        let identity = require_identity(auth)?;
        self.tx(|repo| Ok(repo.find_profile_by_identity(identity)?.map(|p| p.id)))
    }
}

#[cfg(test)]
mod tests {
    use kindred_shared::errors::ErrorKind;

    use super::*;
    use crate::services::testing::{anonymous, harness};

    #[test]
    fn anonymous_callers_are_rejected_before_the_store() {
        let h = harness();
        let err = h.core.current_profile_id(&anonymous()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let blank = "  ".to_string();
        assert_eq!(require_identity(&blank).unwrap_err().kind(), ErrorKind::Authentication);
    }

    #[test]
    fn profile_is_created_lazily_once() {
        let h = harness();
        let me = "auth0|lazy".to_string();
        assert_eq!(h.core.current_profile_id(&me).unwrap(), None);

        let first = h.onboard("auth0|lazy", "woman", "man");
        let second = h.onboard("auth0|lazy", "woman", "man");
        assert_eq!(first, second);
        assert_eq!(h.core.current_profile_id(&me).unwrap(), Some(first));
        assert_eq!(h.store.snapshot().account_count(), 1);
    }
}
