//! Discord presentation: embeds and text formatting.

pub mod embeds;
pub mod format;
