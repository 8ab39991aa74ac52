//! Marketplace domain models and business predicates.
//!
//! Pure, deterministic rules (no IO, no storage): ownership checks, booking
//! windows and status transitions, review eligibility, rating aggregation.

pub mod audit;
pub mod booking;
pub mod provider;
pub mod review;
pub mod service;
pub mod user;

pub use audit::{AuditAction, AuditLog, entity_type};
pub use booking::{Booking, BookingStatus, NewBooking, validate_window, windows_overlap};
pub use provider::{NewProvider, Provider, ProviderPatch};
pub use review::{NewReview, RatingStats, Review, can_leave_review, validate_rating};
pub use service::{NewService, Service, ServicePatch, can_user_edit_service};
pub use user::{User, UserPatch, is_email_taken_by_other, normalize_email};
