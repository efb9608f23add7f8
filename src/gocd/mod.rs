pub mod client;
pub mod types;

pub use client::GoCdClient;
pub use types::{Fetched, GroupDocument, GroupMember};
