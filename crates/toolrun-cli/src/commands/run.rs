use clap::Parser;
use std::io::Write;

use crate::client::{RunRequest, RunStatus, ToolClient};
use crate::error::{ClientError, ClientResult};
use crate::output::OutputFormat;

#[derive(Parser)]
pub struct RunCommand {
    #[clap(help = "Tool slug")]
    pub slug: String,

    #[clap(
        long = "input",
        short = 'i',
        value_parser = parse_input,
        help = "Input value as name=value (repeatable)"
    )]
    pub inputs: Vec<(String, String)>,
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{raw}'")),
    }
}

impl RunCommand {
    pub fn request(&self) -> RunRequest {
        self.inputs
            .iter()
            .fold(RunRequest::new(&self.slug), |request, (name, value)| {
                request.input(name, value)
            })
    }

    /// Stream the tool output to stdout; Ctrl+C cancels the run
    pub async fn execute(&self, client: &ToolClient, format: OutputFormat) -> ClientResult<()> {
        let cancel = async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let mut stdout = std::io::stdout();
        let mut write_error = None;
        let stream_to_stdout = matches!(format, OutputFormat::Table);

        let outcome = client
            .run(
                &self.request(),
                |text| {
                    if stream_to_stdout && write_error.is_none() {
                        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
                            write_error = Some(e);
                        }
                    }
                },
                cancel,
            )
            .await?;

        if let Some(e) = write_error {
            return Err(ClientError::Io(e));
        }

        match format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "slug": self.slug,
                    "status": match outcome.status {
                        RunStatus::Completed => "completed",
                        RunStatus::Cancelled => "cancelled",
                    },
                    "text": outcome.text,
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Table => {
                if !outcome.text.ends_with('\n') {
                    println!();
                }
                if outcome.status == RunStatus::Cancelled {
                    eprintln!("Cancelled after {} bytes.", outcome.text.len());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_input("topic=Async Rust").unwrap(),
            ("topic".to_string(), "Async Rust".to_string())
        );
        assert_eq!(
            parse_input("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_input("empty=").unwrap().1, "");
        assert!(parse_input("novalue").is_err());
        assert!(parse_input("=x").is_err());
    }

    #[test]
    fn test_request_collects_inputs() {
        let command = RunCommand {
            slug: "newsletter-intro".to_string(),
            inputs: vec![
                ("highlights".to_string(), "Tokio 2.0".to_string()),
                ("note".to_string(), "Back from vacation".to_string()),
            ],
        };
        let request = command.request();
        assert_eq!(request.slug, "newsletter-intro");
        assert_eq!(request.inputs["highlights"], "Tokio 2.0");
        assert_eq!(request.inputs.len(), 2);
    }
}
