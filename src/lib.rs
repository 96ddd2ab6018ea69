pub mod config;
pub mod departments;
pub mod metrics;
pub mod profiles;
pub mod routing;
pub mod shared;
pub mod stats;
pub mod tickets;
pub mod web;
