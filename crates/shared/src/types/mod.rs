//! Common types used across the application.

pub mod money;

pub use money::{round_money, sum_or_zero, to_usd};
