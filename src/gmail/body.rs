//! Message payload decoding — headers and best-effort plain-text body.
//!
//! Body extraction prefers concatenated `text/plain` parts, falls back to
//! tag-stripped `text/html`, then to the top-level body data. Malformed
//! data never fails a fetch; it decodes to an empty string and matching
//! continues.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// One MIME header.
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Body data of one part, base64url-encoded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub data: Option<String>,
}

/// A message payload node: headers plus nested parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<Payload>,
}

impl Payload {
    /// Case-insensitive header lookup; missing headers are empty.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }
}

/// Decode base64url message data, tolerating padded and unpadded forms.
/// Undecodable data yields an empty string.
fn decode_body_data(data: &str) -> String {
    let trimmed = data.trim_end_matches('=');
    match URL_SAFE_NO_PAD.decode(trimmed) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Collect decoded bodies of every part with the wanted MIME type.
fn collect_parts_by_mime(payload: &Payload, want: &str, out: &mut Vec<String>) {
    if payload.mime_type.as_deref() == Some(want)
        && let Some(body) = &payload.body
        && let Some(data) = &body.data
        && !data.is_empty()
    {
        let decoded = decode_body_data(data);
        if !decoded.is_empty() {
            out.push(decoded);
        }
    }
    for part in &payload.parts {
        collect_parts_by_mime(part, want, out);
    }
}

/// Extract the best-effort plain-text body of a message.
pub fn extract_plain_body(payload: &Payload) -> String {
    let mut plain = Vec::new();
    collect_parts_by_mime(payload, "text/plain", &mut plain);
    if !plain.is_empty() {
        return plain.join("\n\n").trim().to_string();
    }

    let mut html = Vec::new();
    collect_parts_by_mime(payload, "text/html", &mut html);
    if !html.is_empty() {
        return strip_html(&html.join("\n\n")).trim().to_string();
    }

    if let Some(body) = &payload.body
        && body.size > 0
        && let Some(data) = &body.data
    {
        return decode_body_data(data).trim().to_string();
    }

    String::new()
}

/// Strip HTML tags, keeping line structure so line-bounded masks still
/// see one value per line. Common entities are decoded.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    let mut tag = String::new();
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let t = tag.to_ascii_lowercase();
                if t.starts_with("br") || t.starts_with("/p") || t.starts_with("/div") {
                    text.push('\n');
                }
            }
            _ if in_tag => tag.push(ch),
            _ => text.push(ch),
        }
    }

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    // Collapse runs of spaces per line, drop blank-only lines at ends.
    text.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
