//! Codeweb HTTP backend
//!
//! Account registration/login and question management over
//! [`codeweb_mongodb::Store`].

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::router;
pub use state::AppState;
