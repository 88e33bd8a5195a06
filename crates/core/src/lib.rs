//! Domain core of the video catalog.
//!
//! No I/O of its own: persistence and media storage are reached through the
//! ports in [`store`] and [`media`], so the rules here can be exercised
//! against in-process implementations.
//!
//! - [`query`] -- query-string translation (filters, sort, projection, paging).
//! - [`video`] -- the video entity and its queryable field schema.
//! - [`media`] -- external media references and the media-store port.
//! - [`store`] -- persistence ports and in-memory stores.
//! - [`policy`] -- visibility and ownership rules over all video access.

pub mod error;
pub mod media;
pub mod policy;
pub mod query;
pub mod store;
pub mod types;
pub mod video;
