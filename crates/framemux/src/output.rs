use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framemux_frame::Metadata;
use framemux_rpc::{OperationPath, Response};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    path: String,
    status: u16,
    metadata: &'a Metadata,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_response(path: &OperationPath, response: &Response, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                path: path.to_string(),
                status: response.status,
                metadata: &response.metadata,
                payload_size: response.payload.len(),
                payload: payload_preview(response.payload.as_ref()),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PATH", "STATUS", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    path.to_string(),
                    response.status.to_string(),
                    response.payload.len().to_string(),
                    payload_preview(response.payload.as_ref()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "path={} status={} size={} payload={}",
                path,
                response.status,
                response.payload.len(),
                payload_preview(response.payload.as_ref())
            );
        }
        OutputFormat::Raw => {
            print_raw(response.payload.as_ref());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
