//! Storage adapters for Sahayak.
//!
//! The sled-backed passage index serves retrieval; the audio store holds
//! synthesized replies until clients fetch them.

pub mod audio_store;
pub mod sled_store;

pub use audio_store::{validate_file_name, AudioNaming, FileAudioStore};
pub use sled_store::SledVectorStore;
