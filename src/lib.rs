pub mod client;
pub mod config;
pub mod fetcher;
pub mod import;
pub mod mapping;
pub mod observability;
pub mod planner;
pub mod store;
pub mod xml;
