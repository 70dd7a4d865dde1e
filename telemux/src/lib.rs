//! Library surface for the telemux viewer so tests can reuse its pieces.

pub mod history;
pub mod types;
pub mod viewer;
pub mod ws;
