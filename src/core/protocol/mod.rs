//! Data-channel protocol: wire-format event types and the streaming parser.

pub mod events;
pub mod parser;

pub use events::{
    ApiError, ClientEvent, OutputItem, ResponseSummary, ServerEvent, SessionConfig, StatusDetails,
    ToolDef, TurnDetection,
};
pub use parser::{EXTRACT_GROCERIES_TOOL, EventParser, FunctionCallBuffer, ProtocolSignal};
