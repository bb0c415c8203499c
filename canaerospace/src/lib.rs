//! # CANaerospace
//!
//! A portable implementation of the CANaerospace application layer: frame codec, parameter
//! publish/subscribe, the node service pipeline, and the standard services built on top of
//! it (block data transfer, identification, flash programming, node synchronization).
//!
//! This crate does not own a CAN controller, a clock, or any storage beyond what its const
//! generics allocate inline. [`driver::Driver`] is the seam: supply one, build an
//! [`Instance`] sized for the subscriptions and sessions the application needs, and drive it
//! by feeding it frames as they arrive off the bus.
//!
//! ## Layout
//!
//! - [`frame`] / [`message`]: the wire codec, below the level of any particular node.
//! - [`router`]: classifies a message id into the parameter or service pipeline.
//! - [`param`]: parameter advertise/subscribe/publish and redundant-channel bookkeeping.
//! - [`service`]: the node service registry, and the standard services in its submodules.
//! - [`redundancy`]: the generic redundancy resolver, usable independently of the rest.
//! - [`instance`]: [`Instance`], the orchestrator tying the above together.
#![no_std]

pub mod driver;
pub mod error;
pub mod frame;
pub mod instance;
pub mod message;
pub mod param;
pub mod redundancy;
pub mod router;
pub mod service;
pub mod time;
pub mod types;

pub use driver::Driver;
pub use error::{Error, Result};
pub use instance::{Config, Instance};
pub use time::Timestamp;
