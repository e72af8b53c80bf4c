//! Pickup request lifecycle rules.
//!
//! A request moves strictly forward: `pending -> assigned -> completed`.
//! The assignee fields are written together with the move to `assigned` and
//! never change afterwards, so "has an assignee" is a pure function of the
//! status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Coordinates, DbId};

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ASSIGNED: &str = "assigned";
pub const STATUS_COMPLETED: &str = "completed";

/// Shown when a submission arrives without a map position.
pub const MSG_MISSING_LOCATION: &str = "Please select a location on the map.";
/// Shown when a submission arrives with a blank description.
pub const MSG_MISSING_DESCRIPTION: &str = "Please enter a description.";

/// Prefix of every photo object key in the media store.
pub const PHOTO_PREFIX: &str = "requests";

// ---------------------------------------------------------------------------
// Status machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Assigned,
    Completed,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => STATUS_PENDING,
            RequestStatus::Assigned => STATUS_ASSIGNED,
            RequestStatus::Completed => STATUS_COMPLETED,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            STATUS_PENDING => Some(RequestStatus::Pending),
            STATUS_ASSIGNED => Some(RequestStatus::Assigned),
            STATUS_COMPLETED => Some(RequestStatus::Completed),
            _ => None,
        }
    }

    /// The only status this one may move to, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            RequestStatus::Pending => Some(RequestStatus::Assigned),
            RequestStatus::Assigned => Some(RequestStatus::Completed),
            RequestStatus::Completed => None,
        }
    }

    pub fn can_advance_to(self, target: RequestStatus) -> bool {
        self.next() == Some(target)
    }

    /// Whether a record in this status must carry an assignee.
    pub fn requires_assignee(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }

    /// Reject anything but a single forward step.
    pub fn ensure_can_advance_to(self, target: RequestStatus) -> Result<(), CoreError> {
        if self.can_advance_to(target) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Request is {self}, cannot move to {target}"
            )))
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestStatus::from_name(s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown request status '{s}'")))
    }
}

/// Check the assignee/status invariant for a stored record.
pub fn assignee_consistent(status: RequestStatus, assignee_name: Option<&str>) -> bool {
    status.requires_assignee() == assignee_name.is_some()
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Raw submission fields as received from a requester.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionDraft {
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Optional richer label; synthesized from the coordinates when absent.
    pub location: Option<String>,
}

/// A submission that passed validation and may be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
    pub description: String,
    pub coordinates: Coordinates,
    pub location: String,
}

impl SubmissionDraft {
    /// Validate in the order the user sees it: location first, then text.
    pub fn validate(self) -> Result<ValidSubmission, CoreError> {
        let (Some(latitude), Some(longitude)) = (self.latitude, self.longitude) else {
            return Err(CoreError::validation(MSG_MISSING_LOCATION));
        };
        let description = self.description.trim();
        if description.is_empty() {
            return Err(CoreError::validation(MSG_MISSING_DESCRIPTION));
        }
        let coordinates = Coordinates::new(latitude, longitude)?;

        let location = match self.location.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => location_label(&coordinates),
        };

        Ok(ValidSubmission {
            description: description.to_string(),
            coordinates,
            location,
        })
    }
}

/// Human-readable label for a map-picked position.
pub fn location_label(coordinates: &Coordinates) -> String {
    format!(
        "Location from map ({:.5}, {:.5})",
        coordinates.latitude, coordinates.longitude
    )
}

/// Media-store key for a requester's photo uploaded at `unix_millis`.
pub fn photo_object_path(requester_id: DbId, unix_millis: i64) -> String {
    format!("{PHOTO_PREFIX}/{requester_id}-{unix_millis}.jpg")
}

// ---------------------------------------------------------------------------
// Status tally
// ---------------------------------------------------------------------------

/// Per-status counts shown on the administrator view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub completed: usize,
}

impl StatusCounts {
    pub fn tally(statuses: impl IntoIterator<Item = RequestStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.total += 1;
            match status {
                RequestStatus::Pending => counts.pending += 1,
                RequestStatus::Assigned => counts.assigned += 1,
                RequestStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }
}
