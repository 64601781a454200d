//! Just enough of the AVI RIFF layout to relocate frame payloads after they
//! have been mutated: the `movi` list, the `idx1` table, and the header
//! fields that depend on them.

pub mod file;
pub mod fourcc;

pub use file::{AviFile, FrameRecord};
pub use fourcc::FourCc;
