//! Generating run XML for mutated runs.

use std::sync::OnceLock;

use regex::Regex;

use super::{Revision, Run, Segment, SegmentKind};

/// First character in `text` that XML 1.0 cannot carry, if any.
pub(crate) fn invalid_xml_char(text: &str) -> Option<char> {
    static INVALID: OnceLock<Regex> = OnceLock::new();
    let invalid = INVALID.get_or_init(|| {
        Regex::new(r"[^\x09\x0A\x0D\x20-\x{D7FF}\x{E000}-\x{FFFD}\x{10000}-\x{10FFFF}]")
            .expect("Invalid XML character regex")
    });
    invalid
        .find(text)
        .and_then(|m| m.as_str().chars().next())
}

/// XML replacing the original `<w:r>` element of a mutated run.
///
/// Each segment becomes its own run carrying the original run properties.
/// Deleted and inserted segments are wrapped in `w:del` / `w:ins`. A run
/// whose text was removed entirely produces nothing.
pub(crate) fn run_xml(run: &Run) -> String {
    let mut out = String::new();
    for segment in run.segments.iter().filter(|s| !s.text.is_empty()) {
        match &segment.kind {
            SegmentKind::Plain => push_run(&mut out, &run.properties, segment, "w:t"),
            SegmentKind::Inserted(revision) => {
                open_revision(&mut out, "w:ins", revision);
                push_run(&mut out, &run.properties, segment, "w:t");
                out.push_str("</w:ins>");
            }
            SegmentKind::Deleted(revision) => {
                open_revision(&mut out, "w:del", revision);
                push_run(&mut out, &run.properties, segment, "w:delText");
                out.push_str("</w:del>");
            }
        }
    }
    out
}

fn open_revision(out: &mut String, tag: &str, revision: &Revision) {
    out.push_str(&format!(
        r#"<{tag} w:id="{}" w:author="{}" w:date="{}">"#,
        revision.id,
        html_escape::encode_double_quoted_attribute(&revision.author),
        revision.date,
    ));
}

/// One `<w:r>`. Characters that came from elements are written back as
/// those elements; other tabs and newlines become `<w:tab/>` and `<w:br/>`.
fn push_run(out: &mut String, properties: &str, segment: &Segment, text_tag: &str) {
    out.push_str("<w:r>");
    out.push_str(properties);

    let mut elements = segment.elements.iter().peekable();
    let mut chunk = String::new();
    for (at, ch) in segment.text.char_indices() {
        let special = match (elements.next_if(|(offset, _)| *offset == at), ch) {
            (Some((_, xml)), _) => xml.as_str(),
            (None, '\t') => "<w:tab/>",
            (None, '\n') => "<w:br/>",
            (None, _) => {
                chunk.push(ch);
                continue;
            }
        };
        push_text(out, &chunk, text_tag);
        chunk.clear();
        out.push_str(special);
    }
    push_text(out, &chunk, text_tag);

    out.push_str("</w:r>");
}

fn push_text(out: &mut String, text: &str, tag: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(&format!(
        r#"<{tag} xml:space="preserve">{}</{tag}>"#,
        html_escape::encode_text(text)
    ));
}
