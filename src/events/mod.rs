//! Advisory change log.
//!
//! Hash-chained notifications of registry changes. Nothing in the registry
//! reads them back.

pub mod event;
pub mod log;

pub use event::{ChangeEvent, ChangeEventKind};
pub use log::{ChangeLog, LogError, DEFAULT_RETAINED_EVENTS};
