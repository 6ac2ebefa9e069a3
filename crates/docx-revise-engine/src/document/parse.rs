//! Building the block/run model from `word/document.xml`.

use roxmltree::Node;

use super::{Block, Cell, Paragraph, Run, RunContainer, Segment, Table};

pub(crate) const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub(crate) struct Parsed {
    pub blocks: Vec<Block>,
    /// Largest numeric `w:id` anywhere in the part
    pub max_id: u32,
}

fn is_w(node: Node, name: &str) -> bool {
    node.is_element()
        && node.tag_name().namespace() == Some(W_NS)
        && node.tag_name().name() == name
}

/// Local name of a WordprocessingML element, `None` for anything else.
fn w_name<'a, 'input>(node: Node<'a, 'input>) -> Option<&'a str> {
    (node.is_element() && node.tag_name().namespace() == Some(W_NS))
        .then(|| node.tag_name().name())
}

pub(crate) fn parse(xml: &str) -> Result<Parsed, roxmltree::Error> {
    let doc = roxmltree::Document::parse(xml)?;

    let max_id = doc
        .descendants()
        .filter_map(|n| n.attribute((W_NS, "id")))
        .filter_map(|v| v.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    let mut blocks = Vec::new();
    if let Some(body) = doc.root_element().children().find(|n| is_w(*n, "body")) {
        collect_blocks(xml, body, &mut blocks);
    }

    Ok(Parsed { blocks, max_id })
}

fn collect_blocks(xml: &str, parent: Node, out: &mut Vec<Block>) {
    for child in parent.children() {
        match w_name(child) {
            Some("p") => out.push(Block::Paragraph(paragraph(xml, child))),
            Some("tbl") => out.push(Block::Table(table(xml, child))),
            Some("sdt" | "sdtContent" | "customXml") => collect_blocks(xml, child, out),
            _ => {}
        }
    }
}

fn table(xml: &str, tbl: Node) -> Table {
    let rows = tbl
        .children()
        .filter(|n| is_w(*n, "tr"))
        .map(|tr| {
            tr.children()
                .filter(|n| is_w(*n, "tc"))
                .map(|tc| {
                    let mut paragraphs = Vec::new();
                    collect_paragraphs(xml, tc, &mut paragraphs);
                    Cell { paragraphs }
                })
                .collect()
        })
        .collect();
    Table { rows }
}

/// Paragraphs of a cell in document order, nested tables flattened.
fn collect_paragraphs(xml: &str, parent: Node, out: &mut Vec<Paragraph>) {
    for child in parent.children() {
        match w_name(child) {
            Some("p") => out.push(paragraph(xml, child)),
            Some("tbl" | "tr" | "tc" | "sdt" | "sdtContent" | "customXml") => {
                collect_paragraphs(xml, child, out)
            }
            _ => {}
        }
    }
}

fn paragraph(xml: &str, p: Node) -> Paragraph {
    let mut runs = Vec::new();
    collect_runs(xml, p, RunContainer::Paragraph, &mut runs);
    Paragraph { runs }
}

fn collect_runs(xml: &str, parent: Node, container: RunContainer, out: &mut Vec<Run>) {
    let nested = |kind: RunContainer| {
        if container == RunContainer::Insertion {
            RunContainer::Insertion
        } else {
            kind
        }
    };

    for child in parent.children() {
        match w_name(child) {
            Some("r") => out.push(run(xml, child, container)),
            Some("hyperlink") => collect_runs(xml, child, nested(RunContainer::Hyperlink), out),
            Some("ins" | "moveTo") => collect_runs(xml, child, RunContainer::Insertion, out),
            Some("smartTag" | "customXml" | "fldSimple" | "sdt" | "sdtContent") => {
                collect_runs(xml, child, nested(RunContainer::Other), out)
            }
            // deleted text is not visible and stays as it is
            _ => {}
        }
    }
}

fn run(xml: &str, r: Node, container: RunContainer) -> Run {
    let mut properties = String::new();
    let mut text = String::new();
    let mut elements = Vec::new();
    let mut editable = true;

    for child in r.children().filter(|n| n.is_element()) {
        let stands_for = match w_name(child) {
            Some("rPr") => {
                properties = xml[child.range()].to_string();
                continue;
            }
            Some("t") => {
                text.push_str(child.text().unwrap_or_default());
                continue;
            }
            Some("tab") => '\t',
            Some("br")
                if child
                    .attribute((W_NS, "type"))
                    .is_none_or(|t| t == "textWrapping") =>
            {
                '\n'
            }
            Some("cr") => '\n',
            Some("noBreakHyphen") => '-',
            Some("lastRenderedPageBreak") => continue,
            _ => {
                editable = false;
                continue;
            }
        };
        elements.push((text.len(), xml[child.range()].to_string()));
        text.push(stands_for);
    }

    let segments = if text.is_empty() {
        Vec::new()
    } else {
        vec![Segment {
            elements,
            ..Segment::plain(text)
        }]
    };

    Run {
        properties,
        segments,
        source: r.range(),
        container,
        editable,
        dirty: false,
    }
}
