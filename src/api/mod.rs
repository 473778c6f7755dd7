//! HTTP and WebSocket API over the scanner.

pub mod handlers;
pub mod routes;
pub mod websocket;

pub use handlers::AppState;
pub use routes::create_router;
