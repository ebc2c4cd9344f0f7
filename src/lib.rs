//! # rs-trainbridge
//!
//! Protocol bridge between a Märklin trainbox on the CAN bus and
//! station-protocol (z21) clients on UDP, such as phone throttles.
//!
//! ## Features
//!
//! - **Address translation**: client addresses are mapped onto bus identifiers
//!   by configurable bands (managed, DCC 14/28/128, Motorola, MFX)
//! - **Speed codec**: 14/28/128-step client codes to and from the bus's
//!   normalized 0-1000 range
//! - **Loco registry**: bounded, persisted per-address decoder modes with
//!   speed throttling and DCC protocol announcement
//! - **Turnout registry**: last known accessory positions
//! - **Roster download**: config-data stream session that pulls the loco list
//!   from a mobile station and rewrites it in the client dialect
//! - **Device discovery**: pings for trainboxes and mobile stations, track
//!   protocol setup, system status relay
//!
//! ## Architecture
//!
//! The crate is `no_std` + `alloc` capable and generic over its collaborators:
//!
//! - `traits` - Bus, client, storage and clock abstractions
//! - `address` / `speed` - Pure translation functions
//! - `registry` - Loco and turnout state
//! - `stream` / `session` / `dialect` - Config-data download and rewrite
//! - `bridge` - Main controller that ties everything together
//! - `hal` - In-memory collaborators for tests and demos
//!
//! ## Example
//!
//! ```rust
//! use rs_trainbridge::{
//!     BridgeController, BridgeConfig, BusCommand, PowerState, StationMessage,
//!     hal::{MockBus, MockStation, MockStore},
//!     traits::ClientRequest,
//! };
//!
//! let mut bridge: BridgeController<_, _, _> = BridgeController::new(
//!     BridgeConfig::default(),
//!     MockBus::new(),
//!     MockStation::new(),
//!     MockStore::new(),
//! );
//! bridge.begin(0);
//! assert_eq!(bridge.bus().sent, [BusCommand::Ping]);
//!
//! // A client switches the track on
//! bridge.clients_mut().queue(ClientRequest::SetPower(PowerState::Normal));
//! bridge.cyclic(20);
//!
//! assert_eq!(bridge.bus().sent.last(), Some(&BusCommand::SystemGo { uid: 0 }));
//! assert_eq!(
//!     bridge.clients().last(),
//!     Some(&StationMessage::TrackPower(PowerState::Normal))
//! );
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Client address to bus identifier translation.
pub mod address;
/// Main bridge controller.
pub mod bridge;
/// Bus commands, client messages and shared value types.
pub mod commands;
/// Bridge configuration with builder methods.
pub mod config;
/// Rewriting of roster text into the client dialect.
pub mod dialect;
/// Error type.
pub mod error;
/// In-memory collaborators for tests and demos.
pub mod hal;
/// Helpers for the line-oriented config-data text format.
pub mod parsing;
/// Loco and turnout registries.
pub mod registry;
/// Roster download session.
pub mod session;
/// Speed step encoding.
pub mod speed;
/// Config-data stream reassembly.
pub mod stream;
/// Collaborator interfaces.
pub mod traits;

// Re-exports for convenience
pub use address::{AddressBand, BusOffset, DecoderMode};
pub use bridge::{BridgeController, StationInfo, SystemStatus};
pub use commands::{
    BusCommand, BusDirection, DiscoveryProtocol, FunctionSwitch, LocoInfo, LocoProtocol,
    PowerState, StationMessage, TurnoutPosition,
};
pub use error::BridgeError;
pub use registry::{LocoData, LocoRecord, LocoRegistry, TurnoutRegistry};
pub use session::{CallbackSink, ConfigSession, RosterSink, SessionPhase};
pub use speed::{SpeedCode, StepConfig};
pub use stream::{ConfigDataAssembler, DataType, StreamOutcome};
pub use traits::{
    BusEvent, BusEventSink, ClientEventSink, ClientRequest, Clock, PreferenceStore,
    StationClients, StoreGuard, TrainboxBus,
};

// Config re-exports
pub use config::{AddressConfig, BridgeConfig, SessionConfig, StationConfig, StorageConfig};
