pub mod batches;
pub mod core;
pub mod links;
pub mod portal;
pub mod reports;
pub mod setup;
