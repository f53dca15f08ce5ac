// src/models/mod.rs

pub mod assignment;
pub mod requests;
pub mod session;
pub mod submission;
