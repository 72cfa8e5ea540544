mod client;
mod listing;

pub use client::{ListingClient, ListingError};
pub use listing::{EntryKind, ListingParseError, RemoteEntry, parse_listing};
