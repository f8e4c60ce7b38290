pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod session;
pub mod transport;
pub mod utils;

pub use error::{GatewayError, Result};
pub use gateway::{Gateway, SessionEvent};
pub use session::Role;
pub use transport::{ApiEnvelope, ApiRequest};
