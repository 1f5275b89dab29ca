//! Process-wide logging setup shared by the FusionBrain binaries.

pub mod logging;

pub use logging::{LogFormat, init, init_with};
