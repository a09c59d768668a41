// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod render;
pub mod sse;
pub mod transport;
pub mod types;

// Re-exports
pub use client::OpenAi;
pub use client_logger::{ClientLogger, TracingClientLogger};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{BufferSink, OutputSink, TerminalSink};
pub use transport::{ChatTransport, Completion, FragmentStream};
pub use types::*;
