pub mod audio;
pub mod config;
pub mod http;
pub mod model;
pub mod persistence;
pub mod recording;
pub mod store;

pub use audio::{AudioFile, InputFactory, InputSource, ToneInput, WavFileInput};
pub use config::Config;
pub use http::{create_router, AppState};
pub use model::{CosmicObject, SessionParticipant};
pub use persistence::{persist_events, status_patch, store_recording};
pub use recording::{
    Recorder, RecorderOptions, RecordingError, RecordingEvent, RecordingMachine, RecordingState,
};
pub use store::{CosmicStore, MemoryStore, ObjectStore, StoreError};
