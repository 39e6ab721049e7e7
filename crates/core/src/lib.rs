#![forbid(unsafe_code)]

pub mod csv;
pub mod model;
pub mod pool;
pub mod revisit;
pub mod stats;
pub mod time;

pub use time::Clock;
