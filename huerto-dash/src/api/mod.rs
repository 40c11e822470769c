//! HTTP API handlers for huerto-dash
//!
//! JSON only; charts and PNG rendering belong to the front end.

pub mod dataset;
pub mod days;
pub mod health;
pub mod refresh;
pub mod solar;

pub use dataset::dataset_routes;
pub use days::day_routes;
pub use health::health_routes;
pub use refresh::refresh_routes;
pub use solar::solar_routes;
