//! glbforge - durable FBX to binary glTF conversion jobs
//!
//! This library crate wires the engine crates together for the `glbforge`
//! binary and exposes the client-facing boundary functions for integration
//! testing.

pub mod app;
pub mod shutdown;
pub mod status;

pub use app::App;
pub use shutdown::shutdown_signal;
