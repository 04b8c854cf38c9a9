pub mod client;
pub mod store;

pub use client::NotionClient;
pub use store::NotionStore;
