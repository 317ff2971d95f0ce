//! `custodia-auth`: caller identity boundary.
//!
//! Turns a bearer token into a verified [`UserId`](custodia_core::UserId).
//! Decoupled from HTTP and storage; the engine trusts whatever id comes out.

pub mod claims;
pub mod validator;

pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use validator::{Hs256JwtValidator, JwtValidator};
