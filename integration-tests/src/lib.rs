//! Reference problems shared by the integration tests.

pub mod brachistochrone;
pub mod two_phase;
