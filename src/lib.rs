pub mod analytics;
pub mod collector;
pub mod config;
pub mod fetch;
pub mod filter;
pub mod holidays;
pub mod infra;
pub mod models;
pub mod output;
pub mod predictions;
pub mod services;
pub mod store;
