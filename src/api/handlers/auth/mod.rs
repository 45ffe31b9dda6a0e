//! User account and session handlers.
//!
//! Sessions are a pair of HS256 JWTs. The access token is short-lived and
//! verified by signature alone. The refresh token is long-lived and must also
//! equal the single refresh token stored on the account, so logout or a new
//! login revokes every earlier one and each refresh rotates it.
//!
//! Both tokens travel as `HttpOnly; Secure` cookies (`accessToken`,
//! `refreshToken`); the access token is also accepted as
//! `Authorization: Bearer`, and the refresh token in the request body.

pub(crate) mod account;
mod carrier;
mod password;
pub(crate) mod principal;
pub(crate) mod refresh;
pub(crate) mod session;
mod state;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use carrier::{ACCESS_COOKIE, REFRESH_COOKIE};
pub use principal::{Principal, authenticate, require_auth};
pub use state::{AuthConfig, AuthState};
pub use token::{TokenIssuer, TokenPair};
