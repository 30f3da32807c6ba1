pub mod bindings;
pub mod clock;
pub mod config;
pub mod confirmation;
pub mod control;
pub mod cooldown;
pub mod dispatch;
pub mod engine;
pub mod grouping;
pub mod hid;
pub mod logging;
pub mod metrics;
pub mod prediction_loader;
pub mod runtime;
pub mod safety;
pub mod types;
