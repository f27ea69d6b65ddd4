//! HTTPS server module.
//!
//! This module provides the TLS static file server:
//! - **server**: certificate provisioning, rustls context, listener and serve loop
//! - **static_files**: `ServeDir` router with certificate files hidden
//! - **listing**: HTML index for directories without `index.html`
//! - **shutdown**: programmatic and signal-driven graceful shutdown

mod listing;
mod server;
mod shutdown;
mod static_files;

pub use server::{load_tls_config, start_server, ServerError};
pub use shutdown::{setup_shutdown_handler, ShutdownHandle};
pub use static_files::{create_router, StaticFiles};
