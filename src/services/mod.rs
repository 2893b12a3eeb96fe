//! Service layer: one module per lifecycle concern.

/// Topic names, event names, and typed publish helpers for the bus.
pub mod bus_events;
/// OpenAPI documentation generation.
pub mod documentation;
/// Pre-match ready handshake between the two peers.
pub mod handshake;
/// Health check service.
pub mod health_service;
/// Match boundary operations and join arbitration.
pub mod match_service;
/// Guesser-side search loop over the waiting queue.
pub mod matchmaking;
/// Live draw relay from guesser to creator.
pub mod relay;
/// Server-Sent Events bridging onto bus topics.
pub mod sse_service;
/// Storage connection supervision with degraded mode.
pub mod storage_supervisor;
/// Creator-side waiting room with expiry and abandon cleanup.
pub mod waiting_room;
