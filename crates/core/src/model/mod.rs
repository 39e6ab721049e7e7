mod config;
mod fact;
mod record;

pub use config::{
    ConfigError, SessionConfig, SessionMode, StudentIdentity, TableSelection,
};
pub use fact::{Fact, FactKey, MULTIPLIER_MAX, MULTIPLIER_MIN};
pub use record::{RecordError, ResultRecord};
