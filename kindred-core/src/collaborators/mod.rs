pub mod places;
pub mod storage;

pub use places::{HttpPlacesLookup, PlaceCandidate, PlacesLookup};
pub use storage::ObjectStorage;
