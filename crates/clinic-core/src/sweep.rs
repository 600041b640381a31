//! Orphan-threshold arithmetic.
//!
//! The orphan flag is a cached boolean: the sweep sets it, contact and claim
//! events clear it. Between sweeps it may lag behind `last_contact`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// `now` minus `days` whole days, or a validation error when the result falls
/// outside the representable calendar.
pub fn days_before(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
  Duration::try_days(i64::from(days))
    .and_then(|span| now.checked_sub_signed(span))
    .ok_or_else(|| Error::Validation(format!("{days} days is out of range")))
}

/// Days of silence after which a client counts as unattended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrphanThreshold(u32);

impl Default for OrphanThreshold {
  fn default() -> Self { Self(30) }
}

impl OrphanThreshold {
  pub fn days(days: u32) -> Self { Self(days) }

  pub fn as_days(self) -> u32 { self.0 }

  /// Contacts strictly before this instant are stale.
  pub fn cutoff(self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    days_before(now, self.0)
  }

  /// A threshold reaching past the start of the calendar makes no recorded
  /// contact stale.
  pub fn is_stale(self, last_contact: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match (last_contact, self.cutoff(now)) {
      (None, _) => true,
      (Some(at), Ok(cutoff)) => at < cutoff,
      (Some(_), Err(_)) => false,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn threshold_boundaries() {
    let now = Utc::now();
    let t = OrphanThreshold::default();
    assert!(t.is_stale(Some(now - Duration::days(31)), now));
    assert!(!t.is_stale(Some(now - Duration::days(29)), now));
    assert!(!t.is_stale(Some(now - Duration::days(30)), now));
    assert!(t.is_stale(None, now));
  }

  #[test]
  fn out_of_range_threshold_is_an_error() {
    let now = Utc::now();
    let t = OrphanThreshold::days(4_000_000_000);
    assert!(matches!(t.cutoff(now), Err(Error::Validation(_))));
    assert!(!t.is_stale(Some(now - Duration::days(365)), now));
    assert!(t.is_stale(None, now));
    assert_eq!(days_before(now, 7).unwrap(), now - Duration::days(7));
  }
}
