//! Payment plan lifecycle state machine.
//!
//! The plan's primary status gates every lifecycle action through an explicit
//! transition table; a parallel background-action status tracks the single
//! outstanding async job. All actions are pure functions over in-memory
//! state, applied transactionally by the persistence layer.

pub mod changes;
pub mod error;
pub mod follow_up;
pub mod service;
pub mod transitions;
mod types;

#[cfg(test)]
mod transition_props;

pub use error::PlanError;
pub use follow_up::{create_follow_up, FollowUpInput};
pub use service::{OpenInput, PlanService};
pub use transitions::{allowed_sources, check, target_status, PlanAction, ALL_ACTIONS};
pub use types::{
    BackgroundAction, BuildStatus, DeliveryMechanismAssignment, PaymentPlan, PlanStatus,
    ALL_STATUSES,
};
