//! wallrec records an animated browser simulation into numbered MP4 clips.
//!
//! The pipeline is three stages composed linearly: a session controller
//! opens a headless rendering session against a fixed content source, a
//! frame sampler writes numbered PNG frames on a fixed cadence, and an
//! encoder/namer assembles them into the next unused `wallpaper-<n>.mp4`
//! without ever overwriting a previous artifact.

pub mod config;
pub mod encoder;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod sampler;
pub mod session;
