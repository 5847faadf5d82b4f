pub mod entry;
pub mod filter;
pub mod partition;
pub mod payload;
pub mod time_serde;
