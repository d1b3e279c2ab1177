//! Core data model.

pub mod call_spec;
pub mod generation;
pub mod message;
pub mod response;
pub mod stream;
pub mod usage;

pub use call_spec::*;
pub use generation::*;
pub use message::*;
pub use response::*;
pub use stream::*;
pub use usage::*;
