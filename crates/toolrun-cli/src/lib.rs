pub mod client;
pub mod commands;
pub mod error;
pub mod output;

pub use client::{
    RunOutcome, RunRequest, RunStatus, ToolClient, ToolDetails, ToolListing, Utf8StreamDecoder,
};
pub use commands::{RunCommand, ShowCommand, ToolsCommand};
pub use error::{ClientError, ClientResult};
pub use output::{OutputFormat, truncate_string};
