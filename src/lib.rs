//! # Vidtube (accounts, sessions and owned content)
//!
//! `vidtube` is the REST backend of a small video platform. Most of it is plain
//! CRUD; the part that matters is the credential and session lifecycle and the
//! ownership check that guards every mutation.
//!
//! ## Sessions
//!
//! Login issues a short-lived access token and a longer-lived refresh token,
//! both HS256 JWTs signed with distinct secrets. The refresh token is also stored
//! on the account row. Only one refresh token is valid per account at a time:
//!
//! - **Login** overwrites the stored refresh token.
//! - **Refresh** rotates it with an atomic compare-and-swap keyed on the
//!   presented value, so a refresh token can be used at most once.
//! - **Logout** clears it.
//!
//! ## Authorization
//!
//! Comments, tweets and videos carry an immutable owner. Update and delete
//! handlers resolve the resource first (`404`), then compare its owner with the
//! authenticated principal (`403`). A missing or invalid access token is `401`.

pub mod api;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
