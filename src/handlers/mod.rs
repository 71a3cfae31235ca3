// src/handlers/mod.rs

pub mod definition;
pub mod session;
