//! Symbol search ranking.

pub mod fuzzy;

pub use fuzzy::{score, uri_penalty};
