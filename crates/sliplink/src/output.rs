use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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
struct DatagramOutput<'a> {
    index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    neighbor: Option<&'a str>,
    size: usize,
    hex: String,
    text: Option<&'a str>,
    timestamp: String,
}

pub fn print_datagram(index: u64, neighbor: Option<&str>, datagram: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DatagramOutput {
                index,
                neighbor,
                size: datagram.len(),
                hex: to_hex(datagram),
                text: std::str::from_utf8(datagram).ok(),
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
                .set_header(vec!["#", "NEIGHBOR", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    index.to_string(),
                    neighbor.unwrap_or("-").to_string(),
                    datagram.len().to_string(),
                    payload_preview(datagram),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "#{} neighbor={} size={} payload={}",
                index,
                neighbor.unwrap_or("-"),
                datagram.len(),
                payload_preview(datagram)
            );
        }
        OutputFormat::Raw => {
            print_raw(datagram);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn to_hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse hex text, ignoring ASCII whitespace between digit pairs.
pub fn from_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<u8> = text
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            Ok((hi << 4) | lo)
        })
        .collect()
}

fn hex_value(digit: u8) -> Result<u8, String> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        other => Err(format!("invalid hex digit {:?}", other as char)),
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes: {}>", payload.len(), to_hex(payload)),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
