pub mod cache;
pub mod cli;
pub mod error;
pub mod models;
pub mod remote;
pub mod session;
pub mod store;
pub mod tasks;
