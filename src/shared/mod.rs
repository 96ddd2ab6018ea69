pub mod blob;
pub mod db;
pub mod enums;
pub mod error;
pub mod models;
pub mod schema;
pub mod state;
