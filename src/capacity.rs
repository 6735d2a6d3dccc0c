//! Capacity snapshots, deltas and byte formatting

use crate::cloud::UserSizeInfoResponse;
use serde::{Deserialize, Serialize};

const KB: f64 = 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Used and total bytes of one storage pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUsage {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

/// Personal and family capacity at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacitySnapshot {
    pub personal: StorageUsage,
    pub family: StorageUsage,
}

/// Change in total capacity between two snapshots
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapacityDelta {
    pub personal_bytes: i64,
    pub family_bytes: i64,
}

impl CapacitySnapshot {
    pub fn new(personal: StorageUsage, family: StorageUsage) -> Self {
        Self { personal, family }
    }

    /// Total capacity gained since an earlier snapshot
    pub fn delta_since(&self, before: &CapacitySnapshot) -> CapacityDelta {
        CapacityDelta {
            personal_bytes: signed_diff(self.personal.total_bytes, before.personal.total_bytes),
            family_bytes: signed_diff(self.family.total_bytes, before.family.total_bytes),
        }
    }
}

impl From<&UserSizeInfoResponse> for CapacitySnapshot {
    /// Missing capacity blocks count as zero
    fn from(info: &UserSizeInfoResponse) -> Self {
        let usage = |block: Option<crate::cloud::CapacityInfo>| {
            block
                .map(|b| StorageUsage {
                    used_bytes: b.used_size,
                    total_bytes: b.total_size,
                })
                .unwrap_or_default()
        };

        Self {
            personal: usage(info.cloud_capacity_info),
            family: usage(info.family_capacity_info),
        }
    }
}

impl CapacityDelta {
    pub fn total_bytes(&self) -> i64 {
        self.personal_bytes.saturating_add(self.family_bytes)
    }
}

fn signed_diff(after: u64, before: u64) -> i64 {
    if after >= before {
        i64::try_from(after - before).unwrap_or(i64::MAX)
    } else {
        i64::try_from(before - after).map(|d| -d).unwrap_or(i64::MIN)
    }
}

/// Convert bytes to GiB
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / GB
}

/// Format bytes as GiB with two decimals, without unit
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2}", bytes_to_gb(bytes))
}

/// Format a signed byte count with an explicit sign and a scaled unit
///
/// The unit is the largest of B, KB, MB, GB and TB that keeps the value at
/// or above one. Zero is rendered as `+0 B`.
pub fn format_delta(bytes: i64) -> String {
    let sign = if bytes < 0 { '-' } else { '+' };
    let magnitude = bytes.unsigned_abs() as f64;

    if magnitude < KB {
        return format!("{}{} B", sign, bytes.unsigned_abs());
    }

    let units = ["KB", "MB", "GB", "TB"];
    let mut value = magnitude / KB;
    let mut unit = units[0];
    for next in &units[1..] {
        // Promote when two-decimal rounding would print 1024.00
        if (value * 100.0).round() / 100.0 < KB {
            break;
        }
        value /= KB;
        unit = next;
    }

    format!("{}{:.2} {}", sign, value, unit)
}
