// Interfaces exposing the application services to clients.
pub mod http;

pub use http::{create_router, AppState};
