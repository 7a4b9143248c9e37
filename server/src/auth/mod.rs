//! Credentials, session tokens and the request guards built on them.

pub mod google;
pub mod jwt;
pub mod middleware;
pub mod otp;
pub mod password;
pub mod roles;

pub use jwt::{Claims, JwtKeys, TokenError};
pub use middleware::{authenticate, AuthUser, SESSION_COOKIE};
pub use password::Hasher;
pub use roles::RequireRoleLayer;
