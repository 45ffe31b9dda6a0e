//! Ownership gate for user-created content.
//!
//! Every mutating handler for comments, tweets and videos runs the same three
//! checks in the same order: the id parses (400), the resource exists (404),
//! the caller owns it (403).

use uuid::Uuid;

use super::auth::Principal;
use crate::{
    api::error::ApiError,
    store::{Comment, Tweet, Video},
};

/// A resource with a fixed owning account.
pub trait HasOwner {
    fn owner(&self) -> Uuid;
}

impl HasOwner for Comment {
    fn owner(&self) -> Uuid {
        self.owner
    }
}

impl HasOwner for Tweet {
    fn owner(&self) -> Uuid {
        self.owner
    }
}

impl HasOwner for Video {
    fn owner(&self) -> Uuid {
        self.owner
    }
}

#[must_use]
pub fn authorize_owner<R: HasOwner + ?Sized>(resource: &R, principal: &Principal) -> bool {
    resource.owner() == principal.id
}

/// Resolve a lookup result for a mutation by `principal`.
///
/// # Errors
/// `NotFound` when the resource is missing and `Forbidden` when `principal`
/// does not own it.
pub fn owned_or_reject<R: HasOwner>(
    resource: Option<R>,
    principal: &Principal,
    noun: &str,
    verb: &str,
) -> Result<R, ApiError> {
    let resource =
        resource.ok_or_else(|| ApiError::not_found(format!("{} not found", capitalize(noun))))?;
    if authorize_owner(&resource, principal) {
        Ok(resource)
    } else {
        Err(ApiError::forbidden(format!(
            "You are not authorized to {verb} this {noun}"
        )))
    }
}

/// Parse a path id, naming the parameter in the error.
///
/// # Errors
/// `Validation` when `raw` is not a UUID.
pub fn parse_id(raw: &str, name: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::validation(format!("Invalid {name}")))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
