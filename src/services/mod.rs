// Services module - sync logic and the two external collaborators

pub mod applier;
pub mod catalog;
pub mod library;
pub mod pacing;
pub mod reconcile;
pub mod sync;

// External API clients
pub mod plex;
pub mod tmdb;
