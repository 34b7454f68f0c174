pub mod cache;
pub mod config;
pub mod contact;
pub mod error;
pub mod geo;
pub mod joke;
pub mod mail;
pub mod og;
pub mod portfolio;
pub mod sitemap;
pub mod visitor;
