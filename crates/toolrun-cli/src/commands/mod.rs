pub mod run;
pub mod show;
pub mod tools;

pub use run::RunCommand;
pub use show::ShowCommand;
pub use tools::ToolsCommand;
