//! Deterministic partition of eligible payments.

use std::fmt;

use uuid::Uuid;

use aidra_shared::config::SplitConfig;

use crate::payment::Payment;
use crate::plan::PaymentPlan;

use super::error::SplitError;

/// The grouping strategy of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitType {
    /// Near-equal slices of a caller-chosen count.
    ByRecords,
    /// One chunk per distinct admin area at level 1.
    ByAdminArea1,
    /// One chunk per distinct admin area at level 2.
    ByAdminArea2,
    /// One chunk per distinct admin area at level 3.
    ByAdminArea3,
    /// One chunk per distinct collector.
    ByCollector,
    /// A single chunk containing every eligible payment.
    NoSplit,
}

impl SplitType {
    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ByRecords => "BY_RECORDS",
            Self::ByAdminArea1 => "BY_ADMIN_AREA_1",
            Self::ByAdminArea2 => "BY_ADMIN_AREA_2",
            Self::ByAdminArea3 => "BY_ADMIN_AREA_3",
            Self::ByCollector => "BY_COLLECTOR",
            Self::NoSplit => "NO_SPLIT",
        }
    }

    /// Parses a type from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BY_RECORDS" => Some(Self::ByRecords),
            "BY_ADMIN_AREA_1" => Some(Self::ByAdminArea1),
            "BY_ADMIN_AREA_2" => Some(Self::ByAdminArea2),
            "BY_ADMIN_AREA_3" => Some(Self::ByAdminArea3),
            "BY_COLLECTOR" => Some(Self::ByCollector),
            "NO_SPLIT" => Some(Self::NoSplit),
            _ => None,
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One partition chunk of a plan's eligible payments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentPlanSplit {
    /// Unique identifier.
    pub id: Uuid,
    /// Owning plan.
    pub plan_id: Uuid,
    /// The strategy that produced this chunk.
    pub split_type: SplitType,
    /// Caller-chosen chunk count hint, for by-record splits.
    pub chunk_size: Option<u32>,
    /// Position of this chunk within the split set, starting at 0.
    pub order: i32,
    /// Whether this chunk has been handed to the payment gateway.
    pub sent_to_payment_gateway: bool,
    /// The payments in this chunk, in chunk order.
    pub payment_ids: Vec<Uuid>,
}

/// Stateless service partitioning a plan's payments.
pub struct SplitEngine;

impl SplitEngine {
    /// Partitions the plan's eligible payments into ordered chunks.
    ///
    /// The partition is deterministic: payments are ordered by their external
    /// ID (and group key, where the strategy groups) before slicing. The new
    /// split set replaces any previous one wholesale, so the plan's export
    /// file name is cleared and each eligible payment is re-tagged with its
    /// chunk. Excluded, conflicted, and removed payments never participate.
    pub fn split(
        plan: &mut PaymentPlan,
        payments: &mut [Payment],
        split_type: SplitType,
        chunk_count: Option<usize>,
        config: &SplitConfig,
    ) -> Result<Vec<PaymentPlanSplit>, SplitError> {
        let mut eligible: Vec<usize> = payments
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_eligible())
            .map(|(i, _)| i)
            .collect();
        if eligible.is_empty() {
            return Err(SplitError::NoPaymentsToSplit);
        }
        eligible.sort_by(|&a, &b| payments[a].code.cmp(&payments[b].code));

        let groups: Vec<Vec<usize>> = match split_type {
            SplitType::NoSplit => vec![eligible],
            SplitType::ByRecords => {
                let requested = chunk_count.ok_or(SplitError::ChunkCountRequired)?;
                if requested < config.min_chunk_count || requested > eligible.len() {
                    return Err(SplitError::ChunkCountOutOfRange {
                        requested,
                        min: config.min_chunk_count,
                        max: eligible.len(),
                    });
                }
                slice_evenly(&eligible, requested)
            }
            SplitType::ByAdminArea1 => {
                group_by(&eligible, payments, |p| area_key(p, 1))
            }
            SplitType::ByAdminArea2 => {
                group_by(&eligible, payments, |p| area_key(p, 2))
            }
            SplitType::ByAdminArea3 => {
                group_by(&eligible, payments, |p| area_key(p, 3))
            }
            SplitType::ByCollector => group_by(&eligible, payments, |p| {
                p.snapshot
                    .as_ref()
                    .map(|s| s.collector.code.clone())
                    .unwrap_or_default()
            }),
        };

        if groups.len() > config.max_chunks {
            return Err(SplitError::TooManyChunks {
                produced: groups.len(),
                max: config.max_chunks,
            });
        }

        let chunk_size = match split_type {
            SplitType::ByRecords => chunk_count.and_then(|c| u32::try_from(c).ok()),
            _ => None,
        };

        let mut splits = Vec::with_capacity(groups.len());
        for (order, group) in groups.into_iter().enumerate() {
            let split_id = Uuid::new_v4();
            let mut payment_ids = Vec::with_capacity(group.len());
            for index in group {
                payments[index].split_id = Some(split_id);
                payment_ids.push(payments[index].id);
            }
            splits.push(PaymentPlanSplit {
                id: split_id,
                plan_id: plan.id,
                split_type,
                chunk_size,
                order: i32::try_from(order).unwrap_or(i32::MAX),
                sent_to_payment_gateway: false,
                payment_ids,
            });
        }

        plan.export_file_name = None;
        plan.bump_version();
        Ok(splits)
    }
}

/// The grouping key for an admin-area split at the given level.
///
/// Payments without a recorded area group together under the empty key,
/// which sorts first.
fn area_key(payment: &Payment, level: u8) -> String {
    payment
        .snapshot
        .as_ref()
        .and_then(|s| match level {
            1 => s.admin_area_1.clone(),
            2 => s.admin_area_2.clone(),
            _ => s.admin_area_3.clone(),
        })
        .unwrap_or_default()
}

/// Slices an ordered index list into `count` near-equal contiguous chunks.
///
/// The remainder is distributed one extra element at a time to the leading
/// chunks, so sizes differ by at most one and every chunk is non-empty.
fn slice_evenly(ordered: &[usize], count: usize) -> Vec<Vec<usize>> {
    let base = ordered.len() / count;
    let remainder = ordered.len() % count;

    let mut chunks = Vec::with_capacity(count);
    let mut start = 0;
    for i in 0..count {
        let size = base + usize::from(i < remainder);
        chunks.push(ordered[start..start + size].to_vec());
        start += size;
    }
    chunks
}

/// Groups an ordered index list by a key, keeping groups in key order and
/// payments in external-ID order within each group.
fn group_by(
    ordered: &[usize],
    payments: &[Payment],
    key: impl Fn(&Payment) -> String,
) -> Vec<Vec<usize>> {
    let mut keyed: Vec<(String, usize)> = ordered
        .iter()
        .map(|&i| (key(&payments[i]), i))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| payments[a.1].code.cmp(&payments[b.1].code)));

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current_key: Option<&str> = None;
    for (group_key, index) in &keyed {
        if current_key != Some(group_key.as_str()) {
            groups.push(Vec::new());
            current_key = Some(group_key.as_str());
        }
        if let Some(last) = groups.last_mut() {
            last.push(*index);
        }
    }
    groups
}
