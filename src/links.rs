//! Link extraction and normalization.
//!
//! Two structurally different backends feed the crawler: exported markdown
//! (document-export links embedded in the markup) and raw HTML pages. Both
//! are reduced here to a flat list of canonical target identifiers so the
//! traversal engine never needs to know which backend produced them.

use url::Url;

/// Extract outbound reference targets from exported markdown.
///
/// Recognizes inline links `[text](target)` and autolinks `<https://...>`.
/// Targets are returned raw; callers normalize via [`normalize_url`] or an
/// adapter-specific canonicalizer.
pub fn extract_markdown_links(content: &str) -> Vec<String> {
    let mut links = Vec::new();
    let bytes = content.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b']' => {
                // Inline link: the '(' must immediately follow ']'.
                if i + 1 < bytes.len() && bytes[i + 1] == b'(' {
                    if let Some(end) = content[i + 2..].find(')') {
                        let target = content[i + 2..i + 2 + end].trim();
                        // Strip optional markdown title: (url "title")
                        let target = target.split_whitespace().next().unwrap_or("");
                        if !target.is_empty() {
                            links.push(target.to_string());
                        }
                        i += 2 + end;
                    }
                }
            }
            b'<' => {
                if let Some(end) = content[i + 1..].find('>') {
                    let target = &content[i + 1..i + 1 + end];
                    if target.starts_with("http://") || target.starts_with("https://") {
                        links.push(target.to_string());
                        i += 1 + end;
                    }
                }
            }
            _ => {}
        }
        i += 1;
    }

    links
}

/// Extract `href` targets of anchor elements from an HTML page.
///
/// Event-driven scan; tolerates the tag soup real pages serve, since
/// anything unparseable is simply skipped.
pub fn extract_html_links(html: &str) -> Vec<String> {
    let mut links = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(html.as_bytes());
    reader.config_mut().check_end_names = false;
    let mut buf = Vec::new();
    let mut last_error_pos = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"a" {
                    for attr in e.attributes().flatten() {
                        if attr.key.local_name().as_ref() == b"href" {
                            if let Ok(value) = attr.unescape_value() {
                                let value = value.trim();
                                if !value.is_empty() {
                                    links.push(value.to_string());
                                }
                            }
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            // Skip the offending event and keep scanning; stop only when
            // the reader makes no progress.
            Err(_) => {
                let pos = reader.buffer_position();
                if last_error_pos == Some(pos) {
                    break;
                }
                last_error_pos = Some(pos);
            }
            _ => {}
        }
        buf.clear();
    }

    links
}

/// Resolve a raw link against its base page and reduce it to canonical form.
///
/// Returns `None` for non-HTTP schemes (`mailto:`, `javascript:`, ...) and
/// for anything that does not parse as a URL. The fragment is always
/// dropped, so two links differing only by `#section` canonicalize to the
/// same target.
pub fn normalize_url(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let mut resolved = base.join(raw).ok()?;
    match resolved.scheme() {
        "http" | "https" => {}
        _ => return None,
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
