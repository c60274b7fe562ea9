//! Speech-to-text service: a small HTTP daemon that fronts a pluggable
//! transcription engine, plus the client the assistant uses to reach it.
//! The daemon is independent of the chat pipeline; they share nothing but
//! the serde stack.

pub mod client;
pub mod engine;
pub mod progress;
pub mod server;
pub mod wav;

/// Sample rate the wire format assumes, in hertz. Requests carry raw
/// little-endian f32 mono samples at this rate.
pub const SAMPLE_RATE: u32 = 16_000;
