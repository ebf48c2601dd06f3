use kindred_shared::errors::AppResult;
use kindred_shared::types::auth::IdentityResolver;

use crate::models::ProfileId;
use crate::services::identity::require_identity;
use crate::services::Core;
use crate::store::Repo;

/// Removes every row that references `user`, the profile last. Each step is
/// a no-op when its rows are already gone, so a partial run can be retried.
pub fn delete_profile_closure(repo: &mut dyn Repo, user: ProfileId) -> AppResult<()> {
    for conversation in repo.conversations_for(user)? {
        repo.delete_messages(conversation.id)?;
        repo.delete_conversation(conversation.id)?;
    }
    repo.delete_edges_involving(user)?;
    repo.delete_blocks_involving(user)?;
    repo.delete_rejections_involving(user)?;
    repo.delete_reports_involving(user)?;
    repo.delete_locations_for(user)?;
    repo.delete_profile(user)
}

impl Core {
    /// Deletes the caller's profile, everything hanging off it and the
    /// identity link. Calling it again after success changes nothing.
    pub fn delete_account(&self, auth: &dyn IdentityResolver) -> AppResult<()> {
        let identity = require_identity(auth)?;

        let deleted = self.tx(|repo| {
            let profile = repo.find_profile_by_identity(identity)?;
            if let Some(profile) = &profile {
                delete_profile_closure(repo, profile.id)?;
            }
            repo.delete_account(identity)?;
            Ok(profile.map(|p| p.id))
        })?;

        match deleted {
            Some(profile_id) => tracing::info!(profile_id = %profile_id, "account deleted"),
            None => tracing::debug!("account deletion found no profile"),
        }
        Ok(())
    }
}
