//! Identity bridging between the two external providers and the application session.
//! Keep the public surface thin and split implementation across sub-modules.

mod authenticator;
pub mod backends;
mod bearer;
mod claim;
mod provider;
mod roles;
mod router;
mod session;
mod synthetic;

pub use authenticator::{AuthError, CredentialAuthenticator};
pub use bearer::BearerVerifier;
pub use claim::{IdentityClaim, DEFAULT_ROLE};
pub use provider::{IdentityProvider, PasswordSession, ProviderError, ProviderIdentity, TokenError};
pub use roles::{MemoryRoleStore, RoleDirectory, RoleRecord, RoleStore, StoreError, STATUS_ACTIVE};
pub use router::{resolve_route, FALLBACK_ROUTE, ROLE_ROUTES};
pub use session::{max_age_secs, read_session_cookie, IssuedSession, SessionCodec, SessionError, SESSION_COOKIE};
pub use synthetic::{make_synthetic_address, SyntheticIdentityMapper, DEFAULT_SYNTHETIC_DOMAIN};
