// src/session/mod.rs

//! Timed-assessment session runtime: one student's attempt from the
//! eligibility check through scoring and the durable submission write.

pub mod attempt;
pub mod eligibility;
pub mod error;
pub mod integrity;
pub mod navigation;
pub mod runtime;
pub mod scoring;
pub mod store;
pub mod timer;
pub mod visibility;

pub use error::{IneligibleReason, SessionError, StoreError};
pub use runtime::{Collaborators, SessionRuntime};
