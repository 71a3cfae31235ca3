// src/models/mod.rs

pub mod definition;
pub mod question;
pub mod session;
pub mod summary;
