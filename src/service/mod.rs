pub use app_error::{AppError, AppResult};
pub use self::config::{LogConfig, NetworkConfig, ProtocolConfig, RelayConfig, DEFAULT_PORT};
pub use relay::Relay;
pub use shutdown::{listen_for_signals, Shutdown, ShutdownCoordinator, ShutdownState};
pub use tracing_config::{setup_local_tracing, setup_tracing, TracingGuard};

mod app_error;
mod config;
mod relay;
mod shutdown;
mod tracing_config;
