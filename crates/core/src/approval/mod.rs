//! Multi-step acceptance process.
//!
//! Once a plan is sent for approval it collects individual sign-offs of three
//! types (approval, authorization, finance release) against required counts
//! snapshotted from the threshold table. Reaching a threshold moves the plan
//! to the next stage; a rejection bounces it back to FSP assignment.

pub mod error;
pub mod service;
mod types;

pub use error::AcceptanceError;
pub use service::{AcceptanceInput, AcceptanceOutcome, AcceptanceService};
pub use types::{
    required_counts, AcceptanceAction, AcceptanceThreshold, Approval, ApprovalProcess,
    ApprovalType, RequiredCounts,
};
