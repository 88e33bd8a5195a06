//! Cloudinary-compatible media store.
//!
//! - [`config`] -- account credentials loaded from the environment.
//! - [`client`] -- signed upload/destroy requests implementing
//!   [`vidcat_core::media::MediaStore`].

pub mod client;
pub mod config;

pub use client::{CloudinaryError, CloudinaryMediaStore};
pub use config::CloudinaryConfig;
