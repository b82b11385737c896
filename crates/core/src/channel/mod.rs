//! Channels to out-of-process transform engines.

mod error;
mod http;
mod traits;

pub use error::RemoteError;
pub use http::{HttpChannelFactory, HttpTransformChannel};
pub use traits::{ChannelFactory, ProbeResult, RemoteTransformChannel, RemoteTransformRequest};
