use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use was_simple::Response;

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
struct MetricOutput<'a> {
    name: &'a str,
    value: f32,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    status: u16,
    reason: &'a str,
    headers: Vec<(&'a str, &'a str)>,
    body_size: Option<usize>,
    body: Option<String>,
    metrics: Vec<MetricOutput<'a>>,
}

impl<'a> ResponseOutput<'a> {
    fn new(response: &'a Response) -> Self {
        Self {
            status: response.status.code(),
            reason: response.status.reason(),
            headers: response.headers.iter().collect(),
            body_size: response.body.as_ref().map(|body| body.len()),
            body: response.body.as_deref().map(body_preview),
            metrics: response
                .metrics
                .iter()
                .map(|metric| MetricOutput {
                    name: &metric.name,
                    value: metric.value,
                })
                .collect(),
        }
    }
}

pub fn print_response(response: &Response, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&ResponseOutput::new(response))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec!["status".to_string(), response.status.to_string()]);
            for (name, value) in response.headers.iter() {
                table.add_row(vec![format!("header {name}"), value.to_string()]);
            }
            for metric in &response.metrics {
                table.add_row(vec![format!("metric {}", metric.name), metric.value.to_string()]);
            }
            if let Some(body) = &response.body {
                table.add_row(vec!["body".to_string(), body_preview(body)]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{}", response.status);
            for (name, value) in response.headers.iter() {
                println!("{name}: {value}");
            }
            for metric in &response.metrics {
                println!("# metric {}={}", metric.name, metric.value);
            }
            if let Some(body) = &response.body {
                println!();
                println!("{}", body_preview(body));
            }
        }
        OutputFormat::Raw => {
            if let Some(body) = &response.body {
                print_raw(body);
            }
        }
    }
}

pub fn print_cancelled(after_ms: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{{\"cancelled\":true,\"after_ms\":{after_ms}}}"),
        OutputFormat::Raw => {}
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("request cancelled after {after_ms} ms");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn body_preview(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", body.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use was_simple::Status;

    #[test]
    fn json_output_lists_headers_in_order() {
        let response = Response::new(Status::NOT_FOUND)
            .with_header("b", "2")
            .with_header("a", "1")
            .with_body("gone")
            .with_metric("db", 0.5);
        let json = serde_json::to_value(ResponseOutput::new(&response)).unwrap();
        assert_eq!(json["status"], 404);
        assert_eq!(json["reason"], "Not Found");
        assert_eq!(json["headers"], serde_json::json!([["b", "2"], ["a", "1"]]));
        assert_eq!(json["body"], "gone");
        assert_eq!(json["body_size"], 4);
        assert_eq!(json["metrics"][0]["name"], "db");
    }

    #[test]
    fn missing_body_is_null() {
        let json = serde_json::to_value(ResponseOutput::new(&Response::ok())).unwrap();
        assert!(json["body"].is_null());
        assert!(json["body_size"].is_null());
    }

    #[test]
    fn binary_body_preview() {
        assert_eq!(body_preview(&[0xff, 0xfe]), "<binary 2 bytes>");
    }
}
