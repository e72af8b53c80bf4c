//! Request handlers.
//!
//! Handlers extract and authorize, then delegate to the store or to
//! [`RequestLifecycle`](crate::services::RequestLifecycle) and map errors via
//! [`AppError`](crate::error::AppError).

pub mod auth;
pub mod dashboard;
pub mod requests;
pub mod workers;

use validator::ValidationErrors;

/// First user-facing message from a failed `validator` run.
///
/// Fields are visited in name order so the reported message is stable.
pub(crate) fn validation_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));
    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {field}"))
            })
        })
        .next()
        .unwrap_or_else(|| "Invalid input".to_string())
}
