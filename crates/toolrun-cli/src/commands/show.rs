use clap::Parser;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use toolrun_server::registry::FieldKind;

use crate::client::ToolClient;
use crate::error::ClientResult;
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct ShowCommand {
    #[clap(help = "Tool slug")]
    pub slug: String,
}

impl ShowCommand {
    pub async fn execute(&self, client: &ToolClient, format: OutputFormat) -> ClientResult<()> {
        let tool = client.show_tool(&self.slug).await?;

        match format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&tool)?);
            }
            OutputFormat::Table => {
                println!("{} ({})", tool.name, tool.slug);
                if !tool.description.is_empty() {
                    println!("{}", tool.description);
                }
                println!();

                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL_CONDENSED)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(["Input", "Label", "Kind", "Required", "Options"]);

                for field in &tool.fields {
                    let kind = match field.kind {
                        FieldKind::Text => "text",
                        FieldKind::Textarea => "textarea",
                        FieldKind::Select => "select",
                    };
                    table.add_row([
                        field.name.as_str(),
                        field.label.as_str(),
                        kind,
                        if field.required { "yes" } else { "no" },
                        &field.options.join(", "),
                    ]);
                }

                println!("{table}");
                println!("\nRun with: toolrun-cli run {} -i name=value ...", tool.slug);
            }
        }

        Ok(())
    }
}
