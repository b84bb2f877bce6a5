use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::client::ToolClient;
use crate::error::ClientResult;
use crate::output::{OutputFormat, truncate_string};

#[derive(Parser)]
pub struct ToolsCommand {}

impl ToolsCommand {
    pub async fn execute(&self, client: &ToolClient, format: OutputFormat) -> ClientResult<()> {
        let tools = client.list_tools().await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&tools)?);
            }
            OutputFormat::Table => {
                if tools.is_empty() {
                    println!("No tools registered.");
                    return Ok(());
                }

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Slug", "Name", "Description"]);

                for tool in &tools {
                    table.add_row([
                        tool.slug.as_str(),
                        tool.name.as_str(),
                        &truncate_string(&tool.description, 60),
                    ]);
                }

                println!("{table}");
                println!("\n{} tools", tools.len());
            }
        }

        Ok(())
    }
}
