//! Row models mapped with `sqlx::FromRow`.
//!
//! Rows convert into the core domain types; the core crate stays free of
//! database dependencies.

pub mod user;
pub mod video;
