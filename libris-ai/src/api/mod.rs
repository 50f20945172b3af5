//! HTTP API handlers

pub mod actions;
pub mod catalog;
pub mod credits;
pub mod health;
pub mod items;
pub mod settings;
pub mod sse;

pub use actions::action_routes;
pub use catalog::catalog_routes;
pub use credits::credit_routes;
pub use health::health_routes;
pub use items::item_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
