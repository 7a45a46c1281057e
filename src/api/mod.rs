pub mod http;
pub mod ws;

pub use http::{get_status, ApiError, AppState, ErrorResponse, RelayServer, StatusResponse};
pub use ws::{handle_text, ws_handler, ClientCommand, CommandError, ServerReply};
