use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reservo_core::{BookingId, DomainError, DomainResult, ReviewId, ServiceId, UserId};

use crate::booking::{Booking, BookingStatus};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub user_id: UserId,
    pub service_id: ServiceId,
    pub rating: u8,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub rating: u8,
    pub comment: Option<String>,
}

impl Review {
    pub fn new(booking: &Booking, input: NewReview, now: DateTime<Utc>) -> DomainResult<Self> {
        validate_rating(input.rating)?;
        Ok(Self {
            id: ReviewId::new(),
            booking_id: booking.id,
            user_id: booking.user_id,
            service_id: booking.service_id,
            rating: input.rating,
            comment: input.comment,
            created_at: now,
        })
    }
}

pub fn validate_rating(rating: u8) -> DomainResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(DomainError::bad_request(format!(
            "rating must be between {MIN_RATING} and {MAX_RATING}"
        )));
    }
    Ok(())
}

/// Only the customer of a completed booking may review it.
pub fn can_leave_review(booking: &Booking, user_id: UserId) -> bool {
    booking.status == BookingStatus::Completed && booking.user_id == user_id
}

/// Aggregated rating of a set of reviews.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    /// Mean rating rounded to one decimal; `0.0` when there are no reviews.
    pub avg_rating: f64,
    pub reviews_count: u32,
}

impl RatingStats {
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let (sum, count) = ratings
            .into_iter()
            .fold((0u64, 0u32), |(sum, count), r| (sum + u64::from(r), count + 1));

        if count == 0 {
            return Self {
                avg_rating: 0.0,
                reviews_count: 0,
            };
        }

        let avg = sum as f64 / f64::from(count);
        Self {
            avg_rating: (avg * 10.0).round() / 10.0,
            reviews_count: count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::NewBooking;

    fn completed_booking(customer: UserId) -> Booking {
        let now = Utc::now();
        let mut booking = Booking::new(
            ServiceId::new(),
            customer,
            NewBooking {
                start_at: now,
                end_at: now + chrono::Duration::hours(1),
                notes: None,
            },
            now,
        )
        .unwrap();
        booking.transition(BookingStatus::Confirmed, now).unwrap();
        booking.transition(BookingStatus::Completed, now).unwrap();
        booking
    }

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert_eq!(validate_rating(6).unwrap_err().code(), "bad_request");
    }

    #[test]
    fn only_customer_of_completed_booking_may_review() {
        let customer = UserId::new();
        let booking = completed_booking(customer);

        assert!(can_leave_review(&booking, customer));
        assert!(!can_leave_review(&booking, UserId::new()));

        let mut pending = booking.clone();
        pending.status = BookingStatus::Pending;
        assert!(!can_leave_review(&pending, customer));
    }

    #[test]
    fn stats_round_to_one_decimal() {
        let stats = RatingStats::from_ratings([5, 4, 4]);
        assert_eq!(stats.reviews_count, 3);
        assert_eq!(stats.avg_rating, 4.3);

        assert_eq!(RatingStats::from_ratings([]).avg_rating, 0.0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the average stays within the rating scale.
            #[test]
            fn average_is_within_bounds(ratings in prop::collection::vec(1u8..=5, 1..200)) {
                let stats = RatingStats::from_ratings(ratings.clone());
                prop_assert_eq!(stats.reviews_count as usize, ratings.len());
                prop_assert!(stats.avg_rating >= 1.0 && stats.avg_rating <= 5.0);
            }
        }
    }
}
