//! HTTP API handlers
//!
//! JSON REST for submissions, job status, tracks and the genre taxonomy, plus
//! an SSE stream of job events.

pub mod analysis;
pub mod genres;
pub mod health;
pub mod sse;
pub mod tracks;

pub use analysis::analysis_routes;
pub use genres::genre_routes;
pub use health::health_routes;
pub use sse::event_stream;
pub use tracks::track_routes;
