//! Tradedesk application layer: configuration, logging setup and the coordinator
//! that wires the pure store to the engine.
pub mod config;
pub mod coordinator;
pub mod effects;
pub mod logging;

pub use config::{ConfigError, DeskConfig, CONFIG_FILENAME};
pub use coordinator::Coordinator;
pub use effects::{map_event, EffectRunner};
pub use logging::LogDestination;
