//! Command-line arguments of the streaming and conversion executables.

pub mod convert;
pub mod mapper;
pub mod reducer;
