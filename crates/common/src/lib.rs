//! Ambient plumbing shared by the upgrade binaries.

pub mod logging;
