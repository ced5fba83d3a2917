//! Domain model for strobe
//!
//! Newtypes for the ids and times that flow from the trace stream into the
//! timeline, plus the viewer's structured errors.

pub mod errors;
pub mod types;

pub use errors::ViewerError;
pub use types::{MethodId, ThreadId, Timestamp};
