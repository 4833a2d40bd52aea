mod error;
mod handlers;
mod params;
mod router;
mod types;

pub use router::handle_request;
pub use types::{AppState, Reply, Request};
