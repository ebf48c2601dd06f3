use uuid::Uuid;
use validator::Validate;

use kindred_shared::errors::{AppError, AppResult, ErrorCode};
use kindred_shared::types::auth::IdentityResolver;

use crate::geo::{geohash, round_coordinate, valid_coordinates};
use crate::models::{NewLocation, SavedLocation};
use crate::services::identity::{caller_profile, require_identity};
use crate::services::Core;

impl Core {
    /// Saves a place under its privacy-rounded coordinates. Saving a name the
    /// caller already has returns the stored record untouched.
    pub fn save_location(&self, auth: &dyn IdentityResolver, input: NewLocation) -> AppResult<SavedLocation> {
        let identity = require_identity(auth)?;
        input.validate()?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::new(ErrorCode::ValidationError, "location name cannot be empty"));
        }
        if !valid_coordinates(input.latitude, input.longitude) {
            return Err(AppError::new(
                ErrorCode::InvalidCoordinates,
                "latitude must be within [-90, 90] and longitude within [-180, 180]",
            ));
        }

        let decimals = self.settings.location_decimals;
        let latitude = round_coordinate(input.latitude, decimals);
        let longitude = round_coordinate(input.longitude, decimals);
        let hash = geohash(latitude, longitude, self.settings.geohash_precision);
        let now = self.now();

        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            if let Some(existing) = repo.find_location_by_name(me.id, &name)? {
                return Ok(existing);
            }

            let location = SavedLocation {
                id: Uuid::now_v7(),
                user_id: me.id,
                name: name.clone(),
                latitude,
                longitude,
                geohash: hash.clone(),
                category: input.category.clone(),
                address: input.address.clone(),
                created_at: now,
            };
            repo.insert_location(&location)?;
            Ok(location)
        })
    }

    pub fn list_locations(&self, auth: &dyn IdentityResolver) -> AppResult<Vec<SavedLocation>> {
        let identity = require_identity(auth)?;
        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            repo.locations_for(me.id)
        })
    }

    pub fn remove_location(&self, auth: &dyn IdentityResolver, location_id: Uuid) -> AppResult<()> {
        let identity = require_identity(auth)?;
        self.tx(|repo| {
            let me = caller_profile(repo, identity)?;
            let location = repo
                .find_location(location_id)?
                .ok_or_else(|| AppError::new(ErrorCode::LocationNotFound, "location not found"))?;
            if location.user_id != me.id {
                return Err(AppError::new(
                    ErrorCode::NotLocationOwner,
                    "you can only remove your own locations",
                ));
            }
            repo.delete_location(location.id)
        })
    }
}

#[cfg(test)]
mod tests {
    use kindred_shared::errors::ErrorKind;

    use super::*;
    use crate::services::testing::{harness, unknown_id};

    fn place(name: &str, latitude: f64, longitude: f64) -> NewLocation {
        NewLocation {
            name: name.to_string(),
            latitude,
            longitude,
            category: Some("cafe".into()),
            address: None,
        }
    }

    #[test]
    fn coordinates_are_rounded_and_hashed() {
        let h = harness();
        let me = "auth0|loc".to_string();
        h.onboard(&me, "woman", "man");

        let saved = h.core.save_location(&me, place("Blue Bottle", 40.712776, -73.935242)).unwrap();
        assert_eq!(saved.latitude, 40.713);
        assert_eq!(saved.longitude, -73.935);
        assert_eq!(saved.geohash, geohash(40.713, -73.935, 6));
        assert_eq!(saved.geohash.len(), 6);
    }

    #[test]
    fn duplicate_name_returns_existing_record() {
        let h = harness();
        let me = "auth0|dup".to_string();
        h.onboard(&me, "woman", "man");

        let first = h.core.save_location(&me, place("Gym", 1.0, 1.0)).unwrap();
        let second = h.core.save_location(&me, place("Gym", 2.0, 2.0)).unwrap();
        assert_eq!(first, second);
        assert_eq!(h.core.list_locations(&me).unwrap().len(), 1);
    }

    #[test]
    fn invalid_input_is_rejected() {
        let h = harness();
        let me = "auth0|bad".to_string();
        h.onboard(&me, "woman", "man");

        for (lat, lng) in [(91.0, 0.0), (0.0, -180.5), (f64::INFINITY, 0.0)] {
            let err = h.core.save_location(&me, place("X", lat, lng)).unwrap_err();
            assert_eq!(err.code(), Some(ErrorCode::InvalidCoordinates));
        }
        let err = h.core.save_location(&me, place("   ", 0.0, 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(h.core.list_locations(&me).unwrap().is_empty());
    }

    #[test]
    fn only_the_owner_can_remove() {
        let h = harness();
        let owner = "auth0|owner".to_string();
        let other = "auth0|other".to_string();
        h.onboard(&owner, "woman", "man");
        h.onboard(&other, "man", "woman");
        let saved = h.core.save_location(&owner, place("Park", 10.0, 10.0)).unwrap();

        let err = h.core.remove_location(&other, saved.id).unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::NotLocationOwner));
        assert_eq!(
            h.core.remove_location(&owner, unknown_id()).unwrap_err().code(),
            Some(ErrorCode::LocationNotFound)
        );

        h.core.remove_location(&owner, saved.id).unwrap();
        assert!(h.core.list_locations(&owner).unwrap().is_empty());
    }
}
