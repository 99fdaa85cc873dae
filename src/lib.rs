pub mod config;
pub mod error;
pub mod extractors;
pub mod forms;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod views;
