//! Core types for the able-seaman release manager.
//!
//! Defines the fundamental domain types: release names and object
//! identifiers, manifest ingestion, ownership tags, release plans, the
//! persisted release state, and drift verification.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod id;
pub mod objects;
pub mod plan;
pub mod release;
pub mod state;
pub mod tags;
pub mod verify;

pub use error::CoreError;
pub use id::{Identifier, ReleaseDigest, ReleaseName};
pub use objects::Objects;
pub use plan::{Action, ReleasePlan, Step};
pub use release::Release;
pub use state::{ReleaseState, Revision};
pub use tags::{Labels, ObjectType};
pub use verify::Discrepancy;
