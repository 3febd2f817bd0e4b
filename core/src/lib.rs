pub mod adherence;
pub mod autocomplete;
pub mod civil;
pub mod clock;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod models;
pub mod reminder;
pub mod schedule;
pub mod service;
pub mod store;

pub use error::AdherenceError;
