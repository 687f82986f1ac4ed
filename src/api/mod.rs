//! API Module
//!
//! Wolvesville and Lichess clients, queued Wolvesville calls, and game export
//! options.

pub mod caller;
pub mod export;
pub mod lichess;
pub mod ndjson;
pub mod wov;

pub use caller::{PendingCall, WovApiCaller};
pub use export::{Color, ExportOptions, ExportOptionsBuilder, PerfType, SortOrder};
pub use lichess::{GameStream, LichessClient};
pub use ndjson::{parse_ndjson, parse_ndjson_line, NdjsonDecoder};
pub use wov::WovClient;
