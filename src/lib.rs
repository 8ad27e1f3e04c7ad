//! YAML 1.1 safe loading and dumping.
//!
//! Loading runs text through [`Scanner`], [`Parser`], [`Composer`] and
//! [`construct_document`]; dumping runs a [`Document`] through
//! [`represent_document`], [`Serializer`] and [`Emitter`]. The [`loads`]
//! and [`dumps`] family wires the stages together.

mod char;
mod error;
mod event;
mod input_buffer;
mod location;
mod parser;
mod reader;
mod scalar;
mod scanner;
mod token;

mod composer;
mod constructor;
mod node;
pub mod resolver;
mod timestamp;

mod builder;
mod document;
mod value;

mod config;
mod emitter;
mod representer;
mod serializer;

mod api;
#[cfg(feature = "serde")]
mod serialization;

pub use api::*;
pub use builder::*;
pub use char::*;
pub use composer::*;
pub use config::*;
pub use constructor::*;
pub use document::*;
pub use emitter::*;
pub use error::*;
pub use event::*;
use input_buffer::*;
pub use location::*;
pub use node::*;
pub use parser::*;
pub use reader::*;
pub use representer::*;
pub use scalar::*;
pub use scanner::*;
pub use serializer::*;
pub use timestamp::{Time, Timestamp};
pub use token::*;
pub use value::*;

#[cfg(feature = "serde")]
pub use serialization::*;
