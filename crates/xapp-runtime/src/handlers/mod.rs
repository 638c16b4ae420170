//! Built-in message handlers.

mod health;
mod logging;

pub use health::HealthCheckHandler;
pub use logging::LoggingHandler;
