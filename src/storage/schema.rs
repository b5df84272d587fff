//! Audit log key layout
//!
//! ```text
//! checks/{check_name}/{run_nanos:020}
//! actions/{check_name}_{action_name}_{run_nanos:020}
//! ```
//!
//! Check keys are the run start in Unix nanoseconds, zero-padded to a fixed
//! width so that byte order, numeric order and time order coincide. A
//! second-resolution key would let two runs within the same second
//! overwrite each other.
//!
//! Writing an output again under the same key replaces it. The executor
//! relies on this to annotate a check record with action keys as the
//! actions complete.

use chrono::{DateTime, Utc};

/// Width of a zero-padded `i64` nanosecond timestamp
const KEY_WIDTH: usize = 20;

/// Key of a check output within its check's partition
pub fn check_key(timestamp: &DateTime<Utc>) -> String {
    format!("{:0width$}", timestamp_nanos(timestamp), width = KEY_WIDTH)
}

/// Key of an action output in the flat actions namespace
pub fn action_key(check_name: &str, action_name: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{check_name}_{action_name}_{}", check_key(timestamp))
}

/// Nanoseconds since the epoch; pre-epoch clocks clamp to 0 and far-future
/// ones to `i64::MAX`.
fn timestamp_nanos(timestamp: &DateTime<Utc>) -> i64 {
    timestamp.timestamp_nanos_opt().unwrap_or(i64::MAX).max(0)
}
