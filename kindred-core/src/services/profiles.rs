use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use validator::Validate;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::auth::IdentityResolver;

use crate::models::{HiddenReason, Profile, ProfileId, ProfilePatch, ProfileView};
use crate::services::graph::blocked_either;
use crate::services::identity::{caller_profile, ensure_profile, profile_not_found, require_identity};
use crate::services::Core;

impl Core {
    pub fn get_profile(&self, auth: &dyn IdentityResolver) -> AppResult<Option<Profile>> {
        let identity = require_identity(auth)?;
        self.tx(|repo| repo.find_profile_by_identity(identity))
    }

    /// Creates the caller's profile on first use and merges every field set
    /// in `patch` into it.
    pub fn upsert_profile(&self, auth: &dyn IdentityResolver, patch: ProfilePatch) -> AppResult<ProfileId> {
        let identity = require_identity(auth)?;
        patch.validate()?;

        let now = self.now();
        let cooldown = self.settings.activities_cooldown;
        let profile_id = self.tx(|repo| {
            let mut profile = ensure_profile(repo, identity, now)?;
            apply_patch(&mut profile, patch.clone(), now, cooldown)?;
            repo.update_profile(&profile)?;
            Ok(profile.id)
        })?;

        tracing::info!(profile_id = %profile_id, "profile upserted");
        Ok(profile_id)
    }

    /// Records an already uploaded photo URL at the end of the photo list.
    pub fn append_photo(&self, auth: &dyn IdentityResolver, url: &str) -> AppResult<Profile> {
        let identity = require_identity(auth)?;
        let now = self.now();
        let max_photos = self.settings.max_photos;

        let profile = self.tx(|repo| {
            let mut profile = caller_profile(repo, identity)?;
            if profile.photos.len() >= max_photos {
                return Err(AppError::new(
                    ErrorCode::TooManyPhotos,
                    format!("a profile can hold at most {max_photos} photos"),
                ));
            }
            profile.photos.push(url.to_string());
            profile.updated_at = now;
            repo.update_profile(&profile)?;
            Ok(profile)
        })?;

        tracing::info!(profile_id = %profile.id, photos = profile.photos.len(), "photo appended");
        Ok(profile)
    }

    pub fn get_visible_profile(&self, auth: &dyn IdentityResolver, target: ProfileId) -> AppResult<ProfileView> {
        let identity = require_identity(auth)?;
        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let profile = repo.find_profile(target)?.ok_or_else(profile_not_found)?;

            let hidden = if profile.id == me.id {
                Some(HiddenReason::OwnProfile)
            } else if blocked_either(repo, me.id, profile.id)? {
                Some(HiddenReason::Blocked)
            } else if !profile.is_visible {
                Some(HiddenReason::NotVisible)
            } else {
                None
            };

            Ok(match hidden {
                Some(reason) => ProfileView::Hidden { reason },
                None => ProfileView::Visible(profile),
            })
        })
    }
}

fn apply_patch(
    profile: &mut Profile,
    patch: ProfilePatch,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> AppResult<()> {
    if let Some(activities) = patch.activities {
        if activities != profile.activities {
            check_activities_cooldown(profile.activities_updated_at, now, cooldown)?;
            profile.activities = activities;
            profile.activities_updated_at = Some(now);
        }
    }

    macro_rules! merge {
        ($($field:ident),* $(,)?) => {
            $(if let Some(value) = patch.$field {
                profile.$field = Some(value);
            })*
        };
    }
    merge!(
        name,
        age,
        gender,
        sexuality,
        bio,
        occupation,
        religion,
        location,
        university,
        political_leaning,
        dating_intentions,
        height_cm,
        push_token,
    );

    if let Some(photos) = patch.photos {
        profile.photos = photos;
    }
    if let Some(prefs) = patch.dating_preferences {
        profile.dating_preferences = prefs;
    }
    if let Some(done) = patch.onboarding_complete {
        profile.onboarding_complete = done;
    }
    if let Some(visible) = patch.is_visible {
        profile.is_visible = visible;
    }

    profile.updated_at = now;
    Ok(())
}

fn check_activities_cooldown(
    last_change: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    cooldown: Duration,
) -> AppResult<()> {
    let Some(last_change) = last_change else {
        return Ok(());
    };
    let elapsed = now - last_change;
    if elapsed >= cooldown {
        return Ok(());
    }

    let remaining = cooldown - elapsed;
    let remaining_secs = remaining.num_seconds();
    let days = (remaining_secs + 86_399) / 86_400;
    let unit = if days == 1 { "day" } else { "days" };
    Err(AppError::with_details(
        ErrorCode::ActivitiesCooldown,
        format!("activities can be changed again in {days} {unit}"),
        json!({ "remaining_secs": remaining_secs }),
    ))
}

#[cfg(test)]
mod tests {
    use kindred_shared::errors::ErrorKind;

    use super::*;
    use crate::models::DatingPreferences;
    use crate::services::testing::{harness, unknown_id};

    fn activities(list: &[&str]) -> ProfilePatch {
        ProfilePatch {
            activities: Some(list.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn partial_upsert_keeps_absent_fields() {
        let h = harness();
        let me = "auth0|merge".to_string();
        h.onboard(&me, "woman", "man");

        let patch = ProfilePatch {
            bio: Some("coffee snob".into()),
            height_cm: Some(170),
            ..Default::default()
        };
        h.core.upsert_profile(&me, patch).unwrap();

        let profile = h.core.get_profile(&me).unwrap().unwrap();
        assert_eq!(profile.bio.as_deref(), Some("coffee snob"));
        assert_eq!(profile.height_cm, Some(170));
        assert_eq!(profile.gender.as_deref(), Some("woman"));
        assert_eq!(profile.age, Some(27));
        assert_eq!(profile.dating_preferences.interested_in.as_deref(), Some("man"));
    }

    #[test]
    fn minors_are_rejected_by_the_core() {
        let h = harness();
        let patch = ProfilePatch { age: Some(16), ..Default::default() };
        let err = h.core.upsert_profile(&"auth0|kid".to_string(), patch).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(h.core.get_profile(&"auth0|kid".to_string()).unwrap(), None);
    }

    #[test]
    fn activities_cooldown_blocks_early_changes() {
        let h = harness();
        let me = "auth0|cooldown".to_string();
        h.core.upsert_profile(&me, activities(&["hiking", "chess"])).unwrap();
        let stamped = h.core.get_profile(&me).unwrap().unwrap().activities_updated_at;
        assert!(stamped.is_some());

        h.clock.advance(Duration::days(1));
        let err = h.core.upsert_profile(&me, activities(&["surfing"])).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ActivitiesCooldown));
        assert_eq!(err.kind(), ErrorKind::Policy);
        assert_eq!(err.to_string(), "activities can be changed again in 6 days");

        let stored = h.core.get_profile(&me).unwrap().unwrap();
        assert_eq!(stored.activities, vec!["hiking", "chess"]);
        assert_eq!(stored.activities_updated_at, stamped);

        h.clock.advance(Duration::days(6));
        h.core.upsert_profile(&me, activities(&["surfing"])).unwrap();
        assert_eq!(h.core.get_profile(&me).unwrap().unwrap().activities, vec!["surfing"]);
    }

    #[test]
    fn failed_cooldown_discards_the_whole_patch() {
        let h = harness();
        let me = "auth0|atomic".to_string();
        h.core.upsert_profile(&me, activities(&["a"])).unwrap();

        let mut patch = activities(&["b"]);
        patch.bio = Some("should not land".into());
        assert!(h.core.upsert_profile(&me, patch).is_err());
        assert_eq!(h.core.get_profile(&me).unwrap().unwrap().bio, None);
    }

    #[test]
    fn identical_activities_do_not_restart_the_cooldown() {
        let h = harness();
        let me = "auth0|same".to_string();
        h.core.upsert_profile(&me, activities(&["yoga"])).unwrap();
        let stamped = h.core.get_profile(&me).unwrap().unwrap().activities_updated_at;

        h.clock.advance(Duration::hours(3));
        h.core.upsert_profile(&me, activities(&["yoga"])).unwrap();
        assert_eq!(h.core.get_profile(&me).unwrap().unwrap().activities_updated_at, stamped);
    }

    #[test]
    fn remaining_cooldown_rounds_up_to_days() {
        let now = Utc::now();
        let err = check_activities_cooldown(
            Some(now - Duration::days(7) + Duration::hours(2)),
            now,
            Duration::days(7),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "activities can be changed again in 1 day");
    }

    #[test]
    fn photos_are_capped() {
        let h = harness();
        let me = "auth0|photos".to_string();
        h.onboard(&me, "man", "woman");
        for i in 0..6 {
            h.core.append_photo(&me, &format!("https://cdn.test/{i}.jpg")).unwrap();
        }
        let err = h.core.append_photo(&me, "https://cdn.test/7.jpg").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::TooManyPhotos));
        assert_eq!(h.core.get_profile(&me).unwrap().unwrap().photos.len(), 6);
    }

    #[test]
    fn visibility_is_tagged() {
        let h = harness();
        let alice = "auth0|alice".to_string();
        let bob = "auth0|bob".to_string();
        let alice_id = h.onboard(&alice, "woman", "man");
        let bob_id = h.onboard(&bob, "man", "woman");

        assert!(matches!(
            h.core.get_visible_profile(&alice, bob_id).unwrap(),
            ProfileView::Visible(p) if p.id == bob_id
        ));
        assert_eq!(
            h.core.get_visible_profile(&alice, alice_id).unwrap(),
            ProfileView::Hidden { reason: HiddenReason::OwnProfile }
        );

        h.core
            .upsert_profile(&bob, ProfilePatch { is_visible: Some(false), ..Default::default() })
            .unwrap();
        assert_eq!(
            h.core.get_visible_profile(&alice, bob_id).unwrap(),
            ProfileView::Hidden { reason: HiddenReason::NotVisible }
        );

        h.core.block(&bob, alice_id).unwrap();
        assert_eq!(
            h.core.get_visible_profile(&alice, bob_id).unwrap(),
            ProfileView::Hidden { reason: HiddenReason::Blocked }
        );

        let err = h.core.get_visible_profile(&alice, unknown_id()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn preferences_are_replaced_as_a_unit() {
        let h = harness();
        let me = "auth0|prefs".to_string();
        h.onboard(&me, "woman", "man");
        let prefs = DatingPreferences {
            age_min: Some(25),
            age_max: Some(35),
            interested_in: Some("everyone".into()),
            ..Default::default()
        };
        h.core
            .upsert_profile(&me, ProfilePatch { dating_preferences: Some(prefs.clone()), ..Default::default() })
            .unwrap();
        assert_eq!(h.core.get_profile(&me).unwrap().unwrap().dating_preferences, prefs);
    }
}
