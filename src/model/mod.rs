//! Table resource model
//!
//! Types describing a DynamoDB table as declared in a manifest ([`TableSpec`])
//! and as last reported by the service ([`ObservedTable`]).
//!
//! # Module Structure
//!
//! - [`enums`] - Closed value sets (statuses, billing mode, key types, ...)
//! - [`table`] - Desired and observed table shapes

pub mod enums;
pub mod table;

pub use enums::*;
pub use table::*;
