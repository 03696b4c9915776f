// Audio module - captured chant buffers and speech output

pub mod buffer;
pub mod speech_engine;

pub use buffer::AudioBuffer;
pub use speech_engine::SpeechEngine;
