// src/config.rs - configuration lives in the shared crate
pub use printwatch_shared::config::*;
