//! Merges the feeds of an OPML subscription list into one stream, ranked so
//! that rarely-updated feeds are not buried by prolific ones, and writes the
//! result back out as a single Atom feed.

pub mod config;
pub mod feed;
pub mod model;
pub mod rank;
pub mod util;
