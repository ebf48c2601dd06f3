pub mod clock;
pub mod collaborators;
pub mod config;
pub mod geo;
pub mod models;
pub mod notify;
pub mod routes;
pub mod schema;
pub mod services;
pub mod store;

pub use services::{Core, CoreSettings};
