//! Object store data model
//!
//! Objects are kept as a typed envelope with JSON metadata; dropdown fields
//! decode into the enums in `select`.

mod object;
mod participant;
mod select;

pub use object::{object_types, slugify, CosmicObject, NewObject};
pub use participant::{session_participants, SessionParticipant};
pub use select::{
    normalize_selects, ApprovalStatus, ClipType, EpisodeStatus, InvalidSelect, ParticipantRole,
    RecordingQuality, SelectOption, SelectValue, SessionStatus, SponsorPlacement,
};
