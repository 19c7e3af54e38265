/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Match setup, listing and toss.
pub mod match_service;
/// Store change watchers keeping loaded matches current.
pub mod realtime;
/// Ball submission, undo and derived views.
pub mod scoring_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Storage connection supervisor driving degraded mode.
pub mod storage_supervisor;
