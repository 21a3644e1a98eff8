//! Adventure journal application library
//!
//! This library provides the non-visual core of a personal adventure journal:
//! an adventure store, the list and creation-form screens, great-circle
//! distances, and the platform collaborators (camera, geocoding, live
//! location, navigation) the screens depend on.

mod adventure;
mod card;
mod cli;
mod config;
mod errors;
mod form;
mod geo;
mod list;
mod location_watch;
mod platform;
mod repository;
mod simulator;
mod storage;
mod types;

// Re-export key components
pub use adventure::*;
pub use card::*;
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use form::*;
pub use geo::*;
pub use list::*;
pub use location_watch::*;
pub use platform::*;
pub use repository::*;
pub use simulator::*;
pub use storage::*;
pub use types::*;
