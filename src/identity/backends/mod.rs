//! Concrete identity providers.

mod jwt_token;
mod local_password;
mod remote_password;

pub use jwt_token::JwtTokenProvider;
pub use local_password::{hash_password, LocalPasswordProvider, LocalUser};
pub use remote_password::RemotePasswordProvider;
