pub mod archive;
pub mod artifacts;
pub mod common;
pub mod garmin;
pub mod ido;
pub mod runner;
pub mod sport_type;
pub mod sync;

pub use common::errors;
