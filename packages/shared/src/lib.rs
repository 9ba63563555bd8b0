pub mod config;
pub mod models;
pub mod questions;
pub mod repositories;
pub mod services;
pub mod store;
