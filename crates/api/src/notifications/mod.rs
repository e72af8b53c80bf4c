//! Notification routing: lifecycle events to the users they concern.

pub mod router;

pub use router::NotificationRouter;
