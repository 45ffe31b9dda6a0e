//! Route handlers.
//!
//! `auth` owns accounts and sessions; `comments`, `tweets` and `videos` are the
//! owned content, all mutations going through the `ownership` gate.

pub mod auth;
pub mod comments;
pub mod health;
pub mod ownership;
pub mod tweets;
pub mod videos;
