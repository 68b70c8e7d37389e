//! # Drive Server
//!
//! HTTP front end for the drive manager. Routes translate browser requests
//! into [`DriveService`](core_service::DriveService) calls, keyed by a
//! session cookie.

pub mod audit;
pub mod cli;
pub mod error;
pub mod routes;
pub mod session;

pub use error::AppError;
pub use routes::{create_router, AppState};
