pub mod catalog;
pub mod comparison;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod step;
pub mod step_config;
