//! TLS gRPC dial bootstrap with environment-tuned transport settings.

pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod policy;
pub mod resilience;

pub use config::schema::{BootstrapConfig, DialConfig, TransportConfig};
pub use lifecycle::startup::StartupError;
pub use net::Connection;
pub use policy::PolicyDocument;
