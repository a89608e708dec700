//! Mapping storage, matching and call recording.

mod recorder;
mod registry;
mod types;

pub use recorder::{CallRecord, CallRecorder};
pub use registry::{Candidate, MappingList, MappingRegistry};
pub use types::{
    Mapping, MappingHandle, MappingId, MappingOptions, MappingSummary, Responder,
};
