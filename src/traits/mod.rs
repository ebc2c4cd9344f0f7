//! Collaborator interfaces of the bridge.
//!
//! The controller is generic over everything that touches the outside
//! world, so it runs unchanged on the target and in desktop tests.
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`TrainboxBus`] | CAN transport towards the trainbox |
//! | [`StationClients`] | UDP transport towards station-protocol clients |
//! | [`PreferenceStore`] | Persistent key-value storage |
//! | [`Clock`] | Millisecond time source |
//! | [`BusEventSink`] / [`ClientEventSink`] | Inbound event handlers |
//!
//! Test doubles live in [`crate::hal`].

pub mod bus;
pub mod clock;
pub mod station;
pub mod storage;

pub use bus::*;
pub use clock::*;
pub use station::*;
pub use storage::*;
