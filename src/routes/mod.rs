//! Route handlers, grouped per resource. Every response is the
//! `{success, message?, ...payload}` JSON envelope.

pub mod auth;
pub mod matches;
pub mod projects;
pub mod users;

use bson::oid::ObjectId;

use crate::error::AppError;
use crate::user::User;

/// Parses a client-supplied hex id, turning garbage into a 400 instead of
/// a deserialization panic.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw).map_err(|_| AppError::Validation(format!("Invalid {what} id")))
}

/// Id of a user document loaded from the store. Absent only if the
/// document never went through insert, which is a server bug.
pub(crate) fn user_id(user: &User) -> Result<ObjectId, AppError> {
    user.id
        .ok_or_else(|| AppError::Internal("user document missing id".into()))
}
