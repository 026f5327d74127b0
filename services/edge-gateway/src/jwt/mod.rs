//! Bearer credential handling: typed claims, signed-token codec and the
//! usability check built on top of it.

pub mod claims;
pub mod codec;
pub mod validator;

pub use claims::{Claims, Role};
pub use codec::{MIN_SECRET_BYTES, TokenCodec};
pub use validator::{CredentialValidator, EXPIRY_SAFETY_MARGIN_SECS, Usability};
