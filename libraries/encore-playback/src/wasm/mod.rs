//! WASM bindings for encore-playback
//!
//! Browser implementations of the platform traits plus a JavaScript-facing
//! wrapper around the engine, the video synchronizer and the visualizer.

#[cfg(feature = "wasm")]
pub mod engine;

#[cfg(feature = "wasm")]
pub mod output;

#[cfg(feature = "wasm")]
pub mod scheduler;

#[cfg(feature = "wasm")]
pub use engine::WasmPlaybackEngine;

#[cfg(feature = "wasm")]
pub use output::{WebAnalyser, WebMediaOutput, WebVideo};

#[cfg(feature = "wasm")]
pub use scheduler::WebScheduler;
