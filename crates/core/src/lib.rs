#![forbid(unsafe_code)]

pub mod csv;
pub mod model;
pub mod time;

pub use time::Clock;
