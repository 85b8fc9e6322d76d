//! quire-editor-zones: page-level orchestration for quire editing sessions.
//!
//! This crate provides:
//! - `persistence` - the RPC collaborator trait and its record/context types
//! - `coordinator::MultiZoneCoordinator` - one session per editable region, fan-out save
//! - `frames` - browsing contexts and context-aware range helpers
//! - `iframe::IframeBridge` - hosting a session's target inside an iframe
//! - `telemetry` - tracing subscriber setup (feature `telemetry`)

pub mod coordinator;
pub mod frames;
pub mod iframe;
pub mod persistence;
#[cfg(feature = "telemetry")]
pub mod telemetry;

pub use coordinator::{MultiZoneCoordinator, RegionId, SaveReport, UserNotice, ZoneEvent};
pub use frames::{Frames, NodeRef, Window, WindowId};
pub use iframe::{AssetCache, FrameBinding, HandshakeRegistry, IframeBridge, PendingFrame};
pub use persistence::{
    AttachmentMetadata, LocalPersistence, Persistence, PersistenceError, RecordRef, SaveContext,
};
