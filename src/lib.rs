mod network;
mod service;
mod session;

pub use network::{
    decode_length, encode_length, Establisher, FrameReader, FrameWriter, PendingListener, Role,
    DEFAULT_MAX_MESSAGE_LEN, LENGTH_PREFIX_SIZE,
};
pub use service::{
    listen_for_signals, setup_local_tracing, setup_tracing, AppError, AppResult, LogConfig,
    NetworkConfig, ProtocolConfig, Relay, RelayConfig, Shutdown, ShutdownCoordinator,
    ShutdownState, TracingGuard, DEFAULT_PORT,
};
pub use session::{CounterSnapshot, Session, SessionCounters, SessionEnd};
