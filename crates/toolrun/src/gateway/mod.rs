//! Streaming tool gateway and its HTTP surface

mod relay;
mod response;
mod server;

pub use relay::{GatewayOutcome, RelayStream, Stage, ToolGateway, ToolRequest};
pub use response::{ErrorBody, RAW_RESPONSE_HEADER, error_response, stream_response};
pub use server::{AppState, GatewayServer, create_router};
