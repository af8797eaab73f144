//! Client side of the gateway: typed requests and their dispatch.

mod class;
mod dispatcher;
mod envelope;
mod transport;

pub use class::{RequestClass, TimeoutTier, TimeoutTiers};
pub use dispatcher::{RequestDispatcher, HEADER_PRIORITY, HEADER_REQUEST_ID};
pub use envelope::RequestEnvelope;
pub use transport::{HttpTransport, Transport, TransportError};
