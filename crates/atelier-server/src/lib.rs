pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod flash;
pub mod geo;
pub mod inertia;
pub mod mail;
pub mod notify;
pub mod og;
pub mod routes;
pub mod sitemap;
pub mod state;
