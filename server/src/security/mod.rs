/// Identity and secure-link primitives
///
/// - Opaque numeric ids for public URLs
/// - Keyless checksums for shareable links
/// - Signed identity tokens and their unsigned scope suffix
/// - Resolution of a presented credential into a caller identity
///
/// Everything here is synchronous and holds no per-call state.
pub mod clock;
pub mod error;
pub mod id_codec;
pub mod keys;
pub mod link_checksum;
pub mod resolver;
pub mod scope_suffix;
pub mod token;

pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use error::AuthError;
pub use keys::TokenKeys;
pub use resolver::{BEARER_PREFIX, CredentialSource, IdentityResolver};
pub use token::TokenCodec;
