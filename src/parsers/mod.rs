//! Content extraction from rendered HTML.
//!
//! [`html::extract`] turns one page into a [`PageRecord`](crate::results::PageRecord);
//! [`text`] holds the whitespace and dedup helpers it shares with aggregation.

pub mod html;
pub mod text;


pub use html::{DiscoveredLink, LinkScan, discover_links, extract, extract_with_links};
