//! Command-line front end over the adventure screens.
mod app;
mod args;

pub use app::*;
pub use args::*;
