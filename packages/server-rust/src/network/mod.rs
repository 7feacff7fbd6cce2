//! Networking: configuration, request admission, middleware stack, handlers,
//! and server lifecycle.

pub mod admission;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use admission::AdmissionLayer;
pub use config::NetworkConfig;
pub use handlers::{AppState, ServiceInfo};
pub use module::ServerModule;
pub use shutdown::shutdown_signal;
