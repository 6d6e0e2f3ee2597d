pub mod dispatcher;
#[cfg(feature = "runtime")]
pub mod shared;

pub use dispatcher::{DispatchError, DispatchOutcome, GovernanceDispatcher, PolicyChangeRequest};
#[cfg(feature = "runtime")]
pub use shared::SharedDispatcher;
