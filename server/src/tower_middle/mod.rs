/// Tower middleware module
///
/// - Bridging hyper services into tower
/// - Resolving the caller's identity before routing
pub mod hyper_to_tower_adapter;
pub mod tower_identity;

pub use hyper_to_tower_adapter::HyperToTowerAdapter;
pub use tower_identity::{IdentityLayer, IdentityService};
