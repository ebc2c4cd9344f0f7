//! Collaborator implementations.
//!
//! This module contains concrete implementations of the traits defined in
//! [`crate::traits`]. Only the in-memory mocks ship with the crate; real
//! CAN and UDP transports are provided by the firmware that embeds it.

pub mod mock;

pub use mock::*;
