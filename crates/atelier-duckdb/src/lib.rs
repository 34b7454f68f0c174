pub mod backend;
pub mod contacts;
pub mod jokes;
pub mod schema;

pub use backend::DuckDbBackend;

