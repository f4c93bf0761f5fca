//! Typed payloads and their at-rest encoding
//!
//! Every value written to a feed or a timeline chapter is an *entity*:
//! a JSON payload tagged with a type id. The [`Registry`] holds the
//! [`Shape`] each type must conform to, and the [`EntityCodec`] refuses
//! to write (or read back) anything that does not match.

mod codec;
mod registry;
pub mod schema;
mod shape;

pub(crate) use codec::{open, seal};
pub use codec::{Entity, EntityCodec, EntityError, RawEntity};
pub use registry::{Registry, ValidationError};
pub use shape::{Field, Format, Shape, Violation};
