//! Captured requests and the specifications matched against them.

mod captured;
mod specification;

pub use captured::CapturedRequest;
pub use specification::{
    MatcherFailure, RequestSpecification, RequestSpecificationBuilder, SpecificationReport,
    DEFAULT_PRIORITY,
};
