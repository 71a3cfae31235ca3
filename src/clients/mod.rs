// src/clients/mod.rs

pub mod content;
pub mod generator;
pub mod sqlite;
pub mod store;
