//! Bounded state tables kept by the bridge.
//!
//! - [`LocoRegistry`]: per-locomotive mode, translated address and state block
//! - [`TurnoutRegistry`]: last known accessory positions
//!
//! Both are fixed-capacity (`heapless`) so they behave identically on a
//! microcontroller and on a desktop. Capacities are const generics with
//! defaults from [`crate::config`].

pub mod loco;
pub mod turnout;

pub use loco::{LocoData, LocoRecord, LocoRegistry, FUNCTION_COUNT, PERSISTED_RECORD_LEN};
pub use turnout::{TurnoutRecord, TurnoutRegistry};
