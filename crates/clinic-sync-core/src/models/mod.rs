//! Domain models for the clinic-sync pipeline.

mod derived;
mod source;
mod timestamp;

pub use derived::*;
pub use source::*;
pub use timestamp::*;
