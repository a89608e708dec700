//! Request matchers.
//!
//! Every matcher is a small immutable value implementing [`Matcher<T>`] and
//! returning a [`MatchResult`] with both a failure and a negated-failure
//! message. Families:
//! - `string` - equality, containment, prefix/suffix, regex; path matchers
//! - `headers` - header presence and values
//! - `body` - JSON field and whole-body checks, typed predicates
//! - `logical` - `not`, `all_of`, `any_of`

pub mod body;
mod core;
pub mod headers;
pub mod logical;
pub mod string;

pub use self::core::{
    predicate, CachedValue, MatchResult, Matcher, PredicateMatcher, SharedMatcher,
    StringMatchCore,
};
pub use body::{json_contains, json_equals, json_path_equals, json_path_exists, json_path_matches, typed};
pub use headers::{contains_header, has_header, header_matches};
pub use logical::{all_of, any_of, not};
pub use string::{
    contains, contains_ignoring_case, does_not_contain, does_not_contain_ignoring_case, ends_with,
    equals, equals_ignoring_case, path_equals, path_matches, path_prefix, regex, starts_with,
};
