//! Mock Airtable API and attachment host

use super::config::{API_KEY, BASE_ID};
use serde_json::{Value, json};
use std::path::Path;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One table served by [`mount_base`]
pub struct MockTable {
    /// Table name
    pub name: &'static str,
    /// Records returned for the table, in API shape
    pub records: Vec<Value>,
}

/// Mount the schema endpoint and one records endpoint per table
pub async fn mount_base(server: &MockServer, tables: &[MockTable]) {
    let metadata: Vec<Value> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| json!({ "id": format!("tbl{i}"), "name": t.name, "fields": [] }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/v0/meta/bases/{BASE_ID}/tables")))
        .and(header("Authorization", format!("Bearer {API_KEY}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tables": metadata })))
        .mount(server)
        .await;

    for table in tables {
        let encoded = urlencoding::encode(table.name).into_owned();
        Mock::given(method("GET"))
            .and(path(format!("/v0/{BASE_ID}/{encoded}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "records": table.records })),
            )
            .mount(server)
            .await;
    }
}

/// Serve `body` at `/files/<name>`, optionally after a delay
pub async fn serve_file(server: &MockServer, name: &str, body: &[u8], delay: Option<Duration>) {
    let mut template = ResponseTemplate::new(200).set_body_bytes(body.to_vec());
    if let Some(delay) = delay {
        template = template.set_delay(delay);
    }
    Mock::given(method("GET"))
        .and(path(format!("/files/{name}")))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Make `/files/<name>` always answer with `status`
pub async fn fail_file(server: &MockServer, name: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{name}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Attachment descriptor pointing at `/files/<name>`
pub fn attachment(server: &MockServer, name: &str) -> Value {
    json!({
        "id": format!("att-{name}"),
        "url": format!("{}/files/{name}", server.uri()),
        "filename": name,
        "type": "application/octet-stream"
    })
}

/// Record in API shape
pub fn record(id: &str, fields: Value) -> Value {
    json!({ "id": id, "createdTime": "2024-01-01T00:00:00.000Z", "fields": fields })
}

/// Number of regular files below `root`
pub fn count_files(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count()
}
