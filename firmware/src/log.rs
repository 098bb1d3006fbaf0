//! Console logging for mission activity.
//!
//! Each helper has a defmt body for the MCU and a `println!` body for host
//! builds so tests and bring-up share the same messages.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use mission_core::mission::{MissionState, Transition};
use mission_core::telemetry::{LineError, MissionEvent};

pub fn log_transition(transition: &Transition) {
    emit_transition(transition.from, transition.to, transition.at);
}

pub fn log_event(event: &MissionEvent) {
    emit_event(event);
}

pub fn log_rejected_line(error: LineError) {
    emit_rejected(error);
}

pub fn log_storage_full(entries: usize) {
    emit_storage_full(entries);
}

#[cfg(target_os = "none")]
fn emit_transition(from: MissionState, to: MissionState, at_us: u64) {
    defmt::info!("mission: {} -> {} t={}us", from.as_str(), to.as_str(), at_us);
}

#[cfg(not(target_os = "none"))]
fn emit_transition(from: MissionState, to: MissionState, at_us: u64) {
    println!("mission: {from} -> {to} t={at_us}us");
}

#[cfg(target_os = "none")]
fn emit_event(event: &MissionEvent) {
    defmt::info!(
        "event #{} t={}us {}",
        event.id,
        event.timestamp,
        defmt::Display2Format(&event.kind)
    );
}

#[cfg(not(target_os = "none"))]
fn emit_event(event: &MissionEvent) {
    println!("event #{} t={}us {}", event.id, event.timestamp, event.kind);
}

#[cfg(target_os = "none")]
fn emit_rejected(error: LineError) {
    defmt::warn!("link: rejected command line ({})", defmt::Display2Format(&error));
}

#[cfg(not(target_os = "none"))]
fn emit_rejected(error: LineError) {
    println!("link: rejected command line ({error})");
}

#[cfg(target_os = "none")]
fn emit_storage_full(entries: usize) {
    defmt::warn!("storage: log ring full at {} entries, overwriting", entries);
}

#[cfg(not(target_os = "none"))]
fn emit_storage_full(entries: usize) {
    println!("storage: log ring full at {entries} entries, overwriting");
}
