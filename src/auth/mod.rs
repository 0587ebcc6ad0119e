//! JWT authentication for HTTP requests and WebSocket upgrades.

mod claims;
mod extractor;
mod jwt;

pub use claims::Claims;
pub use extractor::{bearer_token, AuthUser};
pub use jwt::{issue_token, JwtValidator};
