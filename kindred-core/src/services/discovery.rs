use std::collections::{HashMap, HashSet};

use kindred_shared::errors::AppResult;
use kindred_shared::types::auth::IdentityResolver;

use crate::geo::{shared_location_names, tier_for};
use crate::models::{Candidate, ProfileId, SavedLocation};
use crate::services::identity::{caller_profile, require_identity};
use crate::services::Core;

impl Core {
    /// Profiles the caller may be shown, best location overlap first.
    ///
    /// Excluded: the caller, everyone the caller already liked (any status),
    /// passed on, blocked or reported, and everyone who blocked the caller.
    /// People who liked the caller stay in so the like can be returned.
    pub fn discover(&self, auth: &dyn IdentityResolver, limit: Option<usize>) -> AppResult<Vec<Candidate>> {
        let identity = require_identity(auth)?;

        let candidates = self.tx(|repo| {
            let me = caller_profile(repo, identity)?;

            let mut excluded: HashSet<ProfileId> = HashSet::new();
            excluded.insert(me.id);
            excluded.extend(repo.edges_from(me.id)?.into_iter().map(|e| e.user_b));
            excluded.extend(repo.rejected_by(me.id)?);
            excluded.extend(repo.blocked_by(me.id)?);
            excluded.extend(repo.reported_by(me.id)?);
            excluded.extend(repo.blockers_of(me.id)?);

            let pool: Vec<_> = repo
                .candidate_pool(me.dating_preferences.gender_filter())?
                .into_iter()
                .filter(|p| !excluded.contains(&p.id))
                .collect();

            let mine = repo.locations_for(me.id)?;
            let pool_ids: Vec<ProfileId> = pool.iter().map(|p| p.id).collect();
            let mut theirs: HashMap<ProfileId, Vec<SavedLocation>> = HashMap::new();
            for location in repo.locations_for_users(&pool_ids)? {
                theirs.entry(location.user_id).or_default().push(location);
            }

            let mut candidates: Vec<Candidate> = pool
                .into_iter()
                .map(|profile| {
                    let shared = theirs
                        .get(&profile.id)
                        .map(|locations| shared_location_names(&mine, locations))
                        .unwrap_or_default();
                    Candidate {
                        tier: tier_for(shared.len()),
                        shared_locations: shared,
                        profile,
                    }
                })
                .collect();

            // Stable: pool order breaks ties inside a tier.
            candidates.sort_by_key(|c| c.tier);
            if let Some(limit) = limit {
                candidates.truncate(limit);
            }
            Ok(candidates)
        })?;

        tracing::debug!(count = candidates.len(), "discovery computed");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewLocation, ProfilePatch};
    use crate::services::testing::{harness, Harness};

    fn save(h: &Harness, who: &str, names: &[&str]) {
        for (i, name) in names.iter().enumerate() {
            h.core
                .save_location(
                    &who.to_string(),
                    NewLocation {
                        name: name.to_string(),
                        latitude: 40.7 + i as f64 / 100.0,
                        longitude: -73.9,
                        ..Default::default()
                    },
                )
                .unwrap();
        }
    }

    fn ids(candidates: &[Candidate]) -> Vec<ProfileId> {
        candidates.iter().map(|c| c.profile.id).collect()
    }

    #[test]
    fn tiers_follow_shared_locations_and_keep_pool_order() {
        let h = harness();
        let me = "auth0|me".to_string();
        h.onboard(&me, "woman", "man");
        save(&h, &me, &["Cafe", "Park", "Museum", "Gym"]);

        let none = h.onboard("auth0|none", "man", "woman");
        let one = h.onboard("auth0|one", "man", "woman");
        let three = h.onboard("auth0|three", "man", "woman");
        let also_none = h.onboard("auth0|also_none", "man", "woman");
        save(&h, "auth0|one", &["Park", "Beach"]);
        save(&h, "auth0|three", &["Gym", "Cafe", "Museum"]);

        let found = h.core.discover(&me, None).unwrap();
        assert_eq!(ids(&found), vec![three, one, none, also_none]);
        assert_eq!(found[0].tier, 1);
        assert_eq!(found[0].shared_locations, vec!["Cafe", "Gym", "Museum"]);
        assert_eq!(found[1].tier, 2);
        assert_eq!(found[1].shared_locations, vec!["Park"]);
        assert_eq!(found[2].tier, 3);

        let limited = h.core.discover(&me, Some(2)).unwrap();
        assert_eq!(ids(&limited), vec![three, one]);
    }

    #[test]
    fn gender_preference_filters_the_pool() {
        let h = harness();
        let me = "auth0|picky".to_string();
        h.onboard(&me, "man", "woman");
        let woman = h.onboard("auth0|w", "woman", "man");
        h.onboard("auth0|m", "man", "woman");

        assert_eq!(ids(&h.core.discover(&me, None).unwrap()), vec![woman]);

        let open = "auth0|open".to_string();
        h.onboard(&open, "nonbinary", "everyone");
        assert_eq!(h.core.discover(&open, None).unwrap().len(), 3);
    }

    #[test]
    fn gender_preference_is_an_exact_match() {
        let h = harness();
        let non_binary = h.onboard("auth0|nb", "non-binary", "everyone");
        h.onboard("auth0|w", "woman", "everyone");

        let shouting = "auth0|caps".to_string();
        h.onboard(&shouting, "man", "NON-BINARY");
        assert_eq!(ids(&h.core.discover(&shouting, None).unwrap()), vec![non_binary]);

        let pattern = "auth0|pattern".to_string();
        h.onboard(&pattern, "man", "%");
        assert!(h.core.discover(&pattern, None).unwrap().is_empty());

        let underscore = "auth0|underscore".to_string();
        h.onboard(&underscore, "man", "non_binary");
        assert!(h.core.discover(&underscore, None).unwrap().is_empty());
    }

    #[test]
    fn exclusions_cover_every_relationship() {
        let h = harness();
        let me = "auth0|center".to_string();
        h.onboard(&me, "woman", "everyone");

        let liked = h.onboard("auth0|liked", "man", "everyone");
        let passed = h.onboard("auth0|passed", "man", "everyone");
        let blocked = h.onboard("auth0|blocked", "man", "everyone");
        let reported = h.onboard("auth0|reported", "man", "everyone");
        let blocker = h.onboard("auth0|blocker", "man", "everyone");
        let admirer = h.onboard("auth0|admirer", "man", "everyone");
        let stranger = h.onboard("auth0|stranger", "man", "everyone");
        let hidden = h.onboard("auth0|hidden", "man", "everyone");

        h.core.like(&me, liked).unwrap();
        h.core.pass(&me, passed).unwrap();
        h.core.block(&me, blocked).unwrap();
        h.core.report(&me, reported, "spam", None).unwrap();
        let my_id = h.core.current_profile_id(&me).unwrap().unwrap();
        h.core.block(&"auth0|blocker".to_string(), my_id).unwrap();
        h.core.like(&"auth0|admirer".to_string(), my_id).unwrap();
        h.core
            .upsert_profile(
                &"auth0|hidden".to_string(),
                ProfilePatch { is_visible: Some(false), ..Default::default() },
            )
            .unwrap();

        let found = ids(&h.core.discover(&me, None).unwrap());
        assert_eq!(found, vec![admirer, stranger]);
        for gone in [my_id, liked, passed, blocked, reported, blocker, hidden] {
            assert!(!found.contains(&gone));
        }
    }
}
