//! `reservo-auth`: session context and credential lifecycle.
//!
//! Storage and HTTP stay outside: repositories are traits implemented by the
//! store, and the session context is handed in by the caller.

pub mod claims;
pub mod password;
pub mod random;
pub mod reset;
pub mod session;
pub mod signer;
pub mod tokens;

pub use claims::{AccessClaims, RefreshClaims};
pub use password::{BcryptHasher, PasswordHasher};
pub use random::{OsRandom, RandomSource};
pub use reset::{PasswordResetRepository, PasswordResetToken, default_reset_ttl};
pub use session::{SessionContext, SessionCredentials, SessionIdentity};
pub use signer::{Hs256Signer, TokenSigner};
pub use tokens::{
    Credentials, RefreshTokenRecord, RefreshTokenRepository, TokenLifecycleService, TokenSubject,
};
