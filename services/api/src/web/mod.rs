pub mod auth;
pub mod classes;
pub mod content;
pub mod functions;
pub mod lessons;
pub mod middleware;
pub mod presentation_task;
pub mod protocol;
pub mod quiz_task;
pub mod quizzes;
pub mod rest;
pub mod state;
pub mod users;
pub mod ws_handler;

// Re-export the WebSocket handlers and the auth middleware for the binary
// that builds the router.
pub use middleware::require_auth;
pub use ws_handler::{presentation_ws_handler, quiz_ws_handler};
