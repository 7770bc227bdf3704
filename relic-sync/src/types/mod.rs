//! Domain types for the historical sync service.
//!
//! - [`source`] - Event source declarations (log filters and factories)
//! - [`events`] - The service's output event type

pub mod events;
pub mod source;

pub use events::SyncEvent;
pub use source::{
    ChildAddressLocation, EventSource, FactoryCriteria, FactorySource, InvalidChildAddressLocation,
    LogFilterCriteria, LogFilterSource,
};
