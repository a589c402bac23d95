//! Spacetime sync schema and reducer primitives for OpenAgents.

pub mod auth;
pub mod client;
pub mod mapping;
pub mod reducers;
pub mod schema;
pub mod subscriptions;
