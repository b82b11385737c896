//! Transform resolution and the service entry point.

mod loaded;
mod report;
mod service;

pub use loaded::Loaded;
pub use service::TransformService;
