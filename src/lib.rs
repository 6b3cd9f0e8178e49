pub mod cli;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod gesture;
pub mod interrupt;
pub mod library;
pub mod logging;
pub mod models;
pub mod progress;
pub mod queue;
pub mod resume;
pub mod service;

#[cfg(test)]
mod test_support;


pub use error::*;
pub use models::*;
