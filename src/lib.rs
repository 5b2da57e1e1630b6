//! Host-side software for an inclined-plane tribometer. A microcontroller
//! tilts a ramp to a commanded angle and streams the readings of a distance
//! sensor at its top while a body slides down. This crate talks to that
//! controller over a serial line, records one burst of samples per trial and
//! turns the noisy position trace into velocity, acceleration, an energy
//! budget and an estimate of the dynamic friction coefficient.
//!
//! The flow of a session is
//!
//! 1. [`handshake`]: open the port and wait for the controller to be ready,
//! 2. [`capture`]: for every trial, send the angle and record the stream,
//! 3. [`physics`]: derive the kinematics, energies and friction,
//! 4. [`report_sink`]: write the results to disk.
//!
//! [`rig::Rig`] runs steps 2 to 4 over a single long-lived link.

#![warn(missing_docs)]
pub mod args;
pub mod capture;
pub mod config;
pub mod device_message;
pub mod error;
pub mod gui;
pub mod handshake;
pub mod link;
pub mod numeric;
pub mod physics;
pub mod report_sink;
pub mod rig;
pub mod sim_device;
pub mod transport;
