//! HTTP API for the dashboard
//!
//! Session records and the upload handoff:
//! - POST /api/sessions - Create a session object
//! - GET/PATCH /api/sessions/:id - Fetch or update session metadata
//! - PATCH /api/sessions/:id/status - Apply a recording status update
//! - POST /api/recordings/upload - Store a finished take as an audio clip
//!
//! Server-side recorder control:
//! - POST /api/sessions/:id/record/{start,pause,resume,stop}
//! - GET /api/sessions/:id/record - Recorder snapshot
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::AppState;
