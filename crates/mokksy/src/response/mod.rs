//! Response definitions, streaming descriptions and their materialisation.

pub mod body;
pub mod builder;
mod definition;
pub mod emitter;
mod stream;

pub use body::{ChannelBody, MockBody};
pub use definition::{
    ResponseBody, ResponseDefinition, EVENT_STREAM_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
pub use emitter::{EmissionOutcome, EmitterState, StreamingEmitter};
pub use stream::{ChunkResult, ChunkSource, SseEvent, StreamItem, StreamSpec, DONE_SENTINEL};
