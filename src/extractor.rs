//! Turns a raw provider payload into sender, subject and readable body text

use html2text::render::text_renderer::TrivialDecorator;
use tracing::debug;

use crate::error::{AutoLabelError, Result};
use crate::models::{EmailContent, MimeNode, RawMessage};

/// Line width handed to the HTML renderer; wide enough that paragraphs stay intact
const HTML_RENDER_WIDTH: usize = 400;

/// Separator between fragments gathered from nested parts
pub const FRAGMENT_SEPARATOR: &str = "\n---\n";

const TEXT_HTML: &str = "text/html";
const TEXT_PLAIN: &str = "text/plain";

/// Extract `(sender, subject, body)` from a raw message
///
/// Body resolution takes the first non-blank candidate in this order:
/// the single-part payload, the first direct `text/html` part, the first
/// direct `text/plain` part, text gathered one level down, and finally the
/// provider snippet.
pub fn extract(message: &RawMessage) -> Result<EmailContent> {
    let subject = required_header(message, "Subject")?;
    let sender = required_header(message, "From")?;
    let body = extract_body(message)?;

    debug!(
        "Extracted message {} ({} chars of body)",
        message.id,
        body.chars().count()
    );

    Ok(EmailContent {
        sender,
        subject,
        body,
    })
}

fn required_header(message: &RawMessage, name: &str) -> Result<String> {
    message.header(name).map(str::to_string).ok_or_else(|| {
        AutoLabelError::MalformedMessage(format!(
            "message {} has no {} header",
            message.id, name
        ))
    })
}

fn extract_body(message: &RawMessage) -> Result<String> {
    match &message.payload {
        MimeNode::Leaf { mime_type, data } => {
            let text = decode_single_part(&message.id, mime_type, data.as_deref())?;
            if !is_blank(&text) {
                return Ok(text);
            }
        }
        MimeNode::Multipart { parts, .. } => {
            if let Some(html) = first_part(parts, TEXT_HTML) {
                let text = html_to_text(leaf_data(html));
                if !is_blank(&text) {
                    return Ok(text);
                }
            }

            if let Some(plain) = first_part(parts, TEXT_PLAIN) {
                let text = decode_utf8_strict(&message.id, leaf_data(plain))?;
                if !is_blank(&text) {
                    return Ok(text);
                }
            }

            let nested = collect_nested_text(parts);
            if !is_blank(&nested) {
                return Ok(nested);
            }
        }
    }

    debug!("Message {} has no usable body, using snippet", message.id);
    Ok(message.snippet.clone())
}

fn decode_single_part(message_id: &str, mime_type: &str, data: Option<&[u8]>) -> Result<String> {
    let data = data.unwrap_or_default();
    if mime_type.eq_ignore_ascii_case(TEXT_HTML) {
        Ok(html_to_text(data))
    } else if mime_type.eq_ignore_ascii_case(TEXT_PLAIN) {
        decode_utf8_strict(message_id, data)
    } else {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

/// Gather text one level below the top: leaves of nested multiparts plus
/// direct text leaves, decoded lossily
fn collect_nested_text(parts: &[MimeNode]) -> String {
    let mut fragments = Vec::new();

    for part in parts {
        match part {
            MimeNode::Multipart { parts: sub_parts, .. } => {
                for sub in sub_parts {
                    if let MimeNode::Leaf { mime_type, data } = sub {
                        if let Some(text) = decode_text_leaf(mime_type, data.as_deref()) {
                            fragments.push(text);
                        }
                    }
                }
            }
            MimeNode::Leaf { mime_type, data } => {
                if let Some(text) = decode_text_leaf(mime_type, data.as_deref()) {
                    fragments.push(text);
                }
            }
        }
    }

    fragments
        .into_iter()
        .filter(|fragment| !is_blank(fragment))
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR)
}

fn decode_text_leaf(mime_type: &str, data: Option<&[u8]>) -> Option<String> {
    let data = data?;
    if mime_type.eq_ignore_ascii_case(TEXT_HTML) {
        Some(html_to_text(data))
    } else if mime_type.eq_ignore_ascii_case(TEXT_PLAIN) {
        Some(String::from_utf8_lossy(data).into_owned())
    } else {
        None
    }
}

fn first_part<'a>(parts: &'a [MimeNode], mime_type: &str) -> Option<&'a MimeNode> {
    parts
        .iter()
        .find(|part| part.mime_type().eq_ignore_ascii_case(mime_type))
}

fn leaf_data(node: &MimeNode) -> &[u8] {
    match node {
        MimeNode::Leaf { data: Some(data), .. } => data,
        _ => &[],
    }
}

/// Render HTML to plain text, dropping markup
pub fn html_to_text(html: &[u8]) -> String {
    if html.is_empty() {
        return String::new();
    }
    html2text::from_read_with_decorator(html, HTML_RENDER_WIDTH, TrivialDecorator::new())
        .trim()
        .to_string()
}

fn decode_utf8_strict(message_id: &str, data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec()).map_err(|e| {
        AutoLabelError::MalformedMessage(format!(
            "message {} has a text/plain body that is not valid UTF-8: {}",
            message_id, e
        ))
    })
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}
