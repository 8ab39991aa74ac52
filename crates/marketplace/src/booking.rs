use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reservo_core::{BookingId, DomainError, DomainResult, ServiceId, UserId};

/// Booking status lifecycle.
///
/// ```text
/// pending ──> confirmed ──> completed
///    │            │
///    └────────────┴──> cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
        )
    }

    /// Cancelled bookings free their slot.
    pub fn occupies_slot(self) -> bool {
        self != Self::Cancelled
    }
}

impl core::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub service_id: ServiceId,
    /// The customer.
    pub user_id: UserId,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl Booking {
    /// A pending booking for `[start_at, end_at)`.
    pub fn new(service_id: ServiceId, user_id: UserId, input: NewBooking, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_window(input.start_at, input.end_at)?;
        Ok(Self {
            id: BookingId::new(),
            service_id,
            user_id,
            start_at: input.start_at,
            end_at: input.end_at,
            status: BookingStatus::Pending,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        })
    }

    /// `true` if this booking holds its slot and intersects `[start_at, end_at)`.
    pub fn conflicts_with(&self, start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> bool {
        self.status.occupies_slot() && windows_overlap(self.start_at, self.end_at, start_at, end_at)
    }

    pub fn transition(&mut self, next: BookingStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::bad_request(format!(
                "cannot move booking from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}

pub fn validate_window(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> DomainResult<()> {
    if start_at >= end_at {
        return Err(DomainError::bad_request("booking must end after it starts"));
    }
    Ok(())
}

/// Half-open interval intersection: touching endpoints do not overlap.
pub fn windows_overlap(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    fn booking(start: u32, end: u32) -> Booking {
        Booking::new(
            ServiceId::new(),
            UserId::new(),
            NewBooking {
                start_at: at(start),
                end_at: at(end),
                notes: None,
            },
            at(0),
        )
        .unwrap()
    }

    #[test]
    fn empty_or_inverted_window_is_bad_request() {
        let err = Booking::new(
            ServiceId::new(),
            UserId::new(),
            NewBooking {
                start_at: at(10),
                end_at: at(10),
                notes: None,
            },
            at(0),
        )
        .unwrap_err();
        assert_eq!(err.code(), "bad_request");
        assert!(validate_window(at(11), at(10)).is_err());
    }

    #[test]
    fn adjacent_bookings_do_not_conflict() {
        let b = booking(10, 11);
        assert!(!b.conflicts_with(at(11), at(12)));
        assert!(!b.conflicts_with(at(9), at(10)));
        assert!(b.conflicts_with(at(10) + Duration::minutes(30), at(12)));
    }

    #[test]
    fn cancelled_booking_frees_its_slot() {
        let mut b = booking(10, 11);
        b.transition(BookingStatus::Cancelled, at(1)).unwrap();
        assert!(!b.conflicts_with(at(10), at(11)));
    }

    #[test]
    fn transitions_follow_the_lifecycle() {
        let mut b = booking(10, 11);
        assert_eq!(b.status, BookingStatus::Pending);

        assert!(b.transition(BookingStatus::Completed, at(1)).is_err());
        b.transition(BookingStatus::Confirmed, at(1)).unwrap();
        b.transition(BookingStatus::Completed, at(2)).unwrap();
        assert_eq!(b.updated_at, at(2));

        let err = b.transition(BookingStatus::Cancelled, at(3)).unwrap_err();
        assert_eq!(err.code(), "bad_request");
        assert_eq!(b.status, BookingStatus::Completed);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn window() -> impl Strategy<Value = (DateTime<Utc>, DateTime<Utc>)> {
            (0i64..10_000, 1i64..500).prop_map(|(start, len)| {
                let start = at(0) + Duration::minutes(start);
                (start, start + Duration::minutes(len))
            })
        }

        proptest! {
            /// Property: overlap is symmetric.
            #[test]
            fn overlap_is_symmetric((a0, a1) in window(), (b0, b1) in window()) {
                prop_assert_eq!(windows_overlap(a0, a1, b0, b1), windows_overlap(b0, b1, a0, a1));
            }

            /// Property: a non-empty window always overlaps itself.
            #[test]
            fn window_overlaps_itself((a0, a1) in window()) {
                prop_assert!(windows_overlap(a0, a1, a0, a1));
            }
        }
    }
}
