#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Mission logic for the buoyancy-driven AUV.
//
// The crate carries no hardware or executor dependencies so the same state
// machine, actuator model, and cycle orchestration run on the MCU firmware and
// inside the host emulator. Hardware is reached only through the traits in
// `platform` and `actuator`.

pub mod actuator;
pub mod config;
pub mod flags;
pub mod mission;
pub mod orchestrator;
pub mod platform;
pub mod record;
pub mod telemetry;
pub mod timing;
