pub mod client;
pub mod handlers;
pub mod parser;
pub mod pipeline;
pub mod retry;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::scan_routes()
}
