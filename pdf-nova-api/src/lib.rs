//! # pdf-nova-api
//!
//! HTTP server and browser front end for PDF Nova
//!

mod api;
mod assets;
mod error;
mod form;
mod state;

pub use api::{app, health_check, HealthResponse};
pub use error::{AppError, ErrorResponse};
pub use form::FormData;
pub use state::AppState;
