//! Word processing document model.
//!
//! A [`Document`] owns the package bytes, the main document part as an
//! `xi_rope::Rope`, and a block/run view parsed from that part. Edits mutate
//! runs in the view only; [`Document::to_bytes`] compiles every mutated run
//! into one `Delta` that splices regenerated run XML over the original
//! `<w:r>` element, so every byte outside a mutated run is reproduced
//! exactly.
//!
//! While a revision scope is open ([`Document::start_track_revisions`])
//! replaced text is kept as a deleted segment and the new text becomes an
//! inserted segment, which serialize as `w:del` / `w:ins` marks.

mod package;
mod parse;
mod write;

use std::ops::Range;

use chrono::{DateTime, Utc};
use xi_rope::Rope;
use xi_rope::delta::Builder;

use crate::error::{PatchError, RevisionError};

pub use package::{ZIP_SIGNATURE, has_zip_signature};
pub(crate) use write::invalid_xml_char;

/// Who tracked revisions are attributed to, and when.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionAuthor {
    pub name: String,
    pub date: DateTime<Utc>,
}

impl RevisionAuthor {
    /// Author stamped with the current time.
    pub fn now(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: Utc::now(),
        }
    }
}

/// Attribution carried by one revision mark.
#[derive(Debug, Clone, PartialEq)]
pub struct Revision {
    pub id: u32,
    pub author: String,
    /// ISO-8601 UTC timestamp as written to `w:date`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentKind {
    Plain,
    Inserted(Revision),
    Deleted(Revision),
}

/// A stretch of run text with one revision state.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub kind: SegmentKind,
    /// Source XML of the elements behind single characters of `text`
    /// (tabs, breaks, hyphens), keyed by byte offset. Written back as is.
    pub(crate) elements: Vec<(usize, String)>,
}

impl Segment {
    pub fn new(text: impl Into<String>, kind: SegmentKind) -> Self {
        Self {
            text: text.into(),
            kind,
            elements: Vec::new(),
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, SegmentKind::Plain)
    }

    /// Split `text[from..to]` out, keeping element offsets with their
    /// characters.
    fn slice(&self, range: Range<usize>, kind: SegmentKind) -> Segment {
        Segment {
            text: self.text[range.clone()].to_string(),
            kind,
            elements: self
                .elements
                .iter()
                .filter(|(at, _)| range.contains(at))
                .map(|(at, xml)| (at - range.start, xml.clone()))
                .collect(),
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self.kind, SegmentKind::Deleted(_))
    }
}

/// Element a run was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunContainer {
    Paragraph,
    Hyperlink,
    /// Inside an existing tracked insertion
    Insertion,
    /// Smart tags, custom XML, simple fields and content controls
    Other,
}

/// Text sharing one formatting descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    /// Raw `<w:rPr>` element, empty when the run has none
    pub(crate) properties: String,
    pub(crate) segments: Vec<Segment>,
    /// Byte range of the `<w:r>` element in the document part
    pub(crate) source: Range<usize>,
    pub(crate) container: RunContainer,
    /// False when the run holds anything besides text, tabs, breaks and hyphens
    pub(crate) editable: bool,
    pub(crate) dirty: bool,
}

impl Run {
    /// Visible text: plain and inserted segments.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.is_visible())
            .map(|s| s.text.as_str())
            .collect()
    }

    fn visible_len(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.is_visible())
            .map(|s| s.text.len())
            .sum()
    }

    pub fn properties(&self) -> &str {
        &self.properties
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn container(&self) -> RunContainer {
        self.container
    }

    pub fn is_editable(&self) -> bool {
        self.editable
    }

    /// Whether any inserted segment overlaps `local` (visible offsets).
    fn touches_insertion(&self, local: &Range<usize>) -> bool {
        let mut offset = 0;
        for segment in self.segments.iter().filter(|s| s.is_visible()) {
            let span = offset..offset + segment.text.len();
            offset = span.end;
            if matches!(segment.kind, SegmentKind::Inserted(_))
                && span.start < local.end
                && local.start < span.end
            {
                return true;
            }
        }
        false
    }

    /// Remove (or mark deleted) the visible text in `local` and place
    /// `insert` where it was.
    fn splice(&mut self, local: Range<usize>, insert: Option<Segment>, delete_as: Option<Revision>) {
        let mut out = Vec::with_capacity(self.segments.len() + 3);
        let mut insert_at = None;
        let mut offset = 0;

        for segment in std::mem::take(&mut self.segments) {
            if !segment.is_visible() {
                out.push(segment);
                continue;
            }
            let span = offset..offset + segment.text.len();
            offset = span.end;

            let overlaps = span.start < local.end && local.start < span.end;
            let holds_point = local.is_empty()
                && insert_at.is_none()
                && (span.start..=span.end).contains(&local.start);
            if !overlaps && !holds_point {
                out.push(segment);
                continue;
            }

            let from = local.start.clamp(span.start, span.end) - span.start;
            let to = local.end.clamp(span.start, span.end) - span.start;

            out.push(segment.slice(0..from, segment.kind.clone()));
            if from < to
                && let Some(revision) = &delete_as
            {
                out.push(segment.slice(from..to, SegmentKind::Deleted(revision.clone())));
            }
            insert_at = Some(out.len());
            out.push(segment.slice(to..segment.text.len(), segment.kind.clone()));
        }

        if let Some(segment) = insert.filter(|s| !s.text.is_empty()) {
            out.insert(insert_at.unwrap_or(out.len()), segment);
        }

        out.retain(|s| !s.text.is_empty());
        self.segments = coalesce(out);
        self.dirty = true;
    }
}

/// Join neighbouring plain segments.
fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match out.last_mut() {
            Some(last) if last.kind == SegmentKind::Plain && segment.kind == SegmentKind::Plain => {
                let shift = last.text.len();
                last.elements
                    .extend(segment.elements.into_iter().map(|(at, xml)| (at + shift, xml)));
                last.text.push_str(&segment.text)
            }
            _ => out.push(segment),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Paragraph {
    pub(crate) runs: Vec<Run>,
}

impl Paragraph {
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Visible text of all runs.
    pub fn text(&self) -> String {
        self.runs.iter().map(Run::text).collect()
    }

    /// Byte range each run occupies in [`Paragraph::text`].
    pub fn run_spans(&self) -> Vec<Range<usize>> {
        let mut offset = 0;
        self.runs
            .iter()
            .map(|run| {
                let start = offset;
                offset += run.visible_len();
                start..offset
            })
            .collect()
    }

    /// Indices of the runs a replacement of `range` would modify.
    ///
    /// An empty range is an insertion point: it belongs to the run that
    /// ends at or contains it, or to the first run with text when it sits
    /// at the very start.
    pub fn runs_touched(&self, range: Range<usize>) -> Vec<usize> {
        let spans = self.run_spans();
        let with_text = spans.iter().enumerate().filter(|(_, s)| !s.is_empty());

        if range.is_empty() {
            let at = range.start;
            let found = if at == 0 {
                with_text.map(|(i, _)| i).next()
            } else {
                with_text
                    .filter(|(_, s)| s.start < at && at <= s.end)
                    .map(|(i, _)| i)
                    .next()
            };
            return found.into_iter().collect();
        }

        with_text
            .filter(|(_, s)| s.start < range.end && range.start < s.end)
            .map(|(i, _)| i)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

/// Address of one paragraph in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphId {
    Body(usize),
    Cell {
        table: usize,
        row: usize,
        cell: usize,
        paragraph: usize,
    },
}

#[derive(Debug, Clone)]
struct RevisionScope {
    author: String,
    date: String,
}

/// A parsed document package.
pub struct Document {
    /// Package bytes as read; other parts are copied from here on save
    package: Vec<u8>,
    xml: Rope,
    blocks: Vec<Block>,
    scope: Option<RevisionScope>,
    next_revision_id: u32,
    revisions: usize,
}

impl Document {
    /// Open a package and parse its main document part.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RevisionError> {
        if !has_zip_signature(bytes) {
            return Err(RevisionError::InvalidContainer);
        }
        let xml = package::read_part(bytes, package::DOCUMENT_PART)?;
        let parsed = parse::parse(&xml)?;

        Ok(Self {
            package: bytes.to_vec(),
            xml: Rope::from(xml.as_str()),
            blocks: parsed.blocks,
            scope: None,
            next_revision_id: parsed.max_id + 1,
            revisions: 0,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Every paragraph in search order: body paragraphs first, then table
    /// cells row-major, table by table.
    pub fn paragraph_ids(&self) -> Vec<ParagraphId> {
        let mut ids: Vec<ParagraphId> = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| matches!(b, Block::Paragraph(_)))
            .map(|(i, _)| ParagraphId::Body(i))
            .collect();

        for (table, block) in self.blocks.iter().enumerate() {
            let Block::Table(t) = block else {
                continue;
            };
            for (row, cells) in t.rows.iter().enumerate() {
                for (cell, c) in cells.iter().enumerate() {
                    ids.extend((0..c.paragraphs.len()).map(|paragraph| ParagraphId::Cell {
                        table,
                        row,
                        cell,
                        paragraph,
                    }));
                }
            }
        }
        ids
    }

    pub fn paragraph(&self, id: ParagraphId) -> Option<&Paragraph> {
        match id {
            ParagraphId::Body(i) => match self.blocks.get(i)? {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            },
            ParagraphId::Cell {
                table,
                row,
                cell,
                paragraph,
            } => match self.blocks.get(table)? {
                Block::Table(t) => t.rows.get(row)?.get(cell)?.paragraphs.get(paragraph),
                Block::Paragraph(_) => None,
            },
        }
    }

    fn paragraph_mut(&mut self, id: ParagraphId) -> Option<&mut Paragraph> {
        match id {
            ParagraphId::Body(i) => match self.blocks.get_mut(i)? {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            },
            ParagraphId::Cell {
                table,
                row,
                cell,
                paragraph,
            } => match self.blocks.get_mut(table)? {
                Block::Table(t) => t
                    .rows
                    .get_mut(row)?
                    .get_mut(cell)?
                    .paragraphs
                    .get_mut(paragraph),
                Block::Paragraph(_) => None,
            },
        }
    }

    fn paragraphs(&self) -> Vec<&Paragraph> {
        let mut out = Vec::new();
        for block in &self.blocks {
            match block {
                Block::Paragraph(p) => out.push(p),
                Block::Table(t) => out.extend(t.rows.iter().flatten().flat_map(|c| &c.paragraphs)),
            }
        }
        out
    }

    /// Visible text, one line per paragraph in document order.
    pub fn plain_text(&self) -> String {
        self.paragraphs()
            .iter()
            .map(|p| p.text())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Record subsequent replacements as tracked revisions.
    pub fn start_track_revisions(&mut self, author: RevisionAuthor) {
        self.scope = Some(RevisionScope {
            author: author.name,
            date: author.date.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        });
    }

    pub fn stop_track_revisions(&mut self) {
        self.scope = None;
    }

    pub fn is_tracking_revisions(&self) -> bool {
        self.scope.is_some()
    }

    /// Revision marks created since the document was opened.
    pub fn revision_count(&self) -> usize {
        self.revisions
    }

    fn next_revision(&mut self) -> Option<Revision> {
        let scope = self.scope.as_ref()?;
        let revision = Revision {
            id: self.next_revision_id,
            author: scope.author.clone(),
            date: scope.date.clone(),
        };
        self.next_revision_id += 1;
        self.revisions += 1;
        Some(revision)
    }

    /// Replace the visible text at `range` of a paragraph with `text`.
    ///
    /// The replacement text takes the formatting of the first run touched;
    /// the rest of the range is removed from (or, in a revision scope,
    /// marked deleted in) the following runs. Fails without changing
    /// anything if a touched run is protected, or in a revision scope if
    /// it touches an existing insertion.
    pub fn replace(
        &mut self,
        id: ParagraphId,
        range: Range<usize>,
        text: &str,
    ) -> Result<(), PatchError> {
        if let Some(ch) = write::invalid_xml_char(text) {
            return Err(PatchError::InvalidCharacter(ch as u32));
        }
        let tracking = self.is_tracking_revisions();
        let Some(paragraph) = self.paragraph(id) else {
            return Err(PatchError::NoParagraph(id));
        };

        let spans = paragraph.run_spans();
        let touched = paragraph.runs_touched(range.clone());
        let mut plan = Vec::with_capacity(touched.len());
        for &i in &touched {
            let run = &paragraph.runs[i];
            let span = &spans[i];
            let local = range.start.clamp(span.start, span.end) - span.start
                ..range.end.clamp(span.start, span.end) - span.start;
            if !run.editable {
                return Err(PatchError::ProtectedRun);
            }
            if tracking
                && (run.container == RunContainer::Insertion || run.touches_insertion(&local))
            {
                return Err(PatchError::InsideInsertion);
            }
            plan.push((i, local));
        }

        let mut steps = Vec::with_capacity(plan.len());
        for (n, (i, local)) in plan.into_iter().enumerate() {
            let delete_as = if local.is_empty() {
                None
            } else {
                self.next_revision()
            };
            let insert = if n == 0 && !text.is_empty() {
                Some(match self.next_revision() {
                    Some(revision) => Segment::new(text, SegmentKind::Inserted(revision)),
                    None => Segment::plain(text),
                })
            } else {
                None
            };
            steps.push((i, local, insert, delete_as));
        }

        if let Some(paragraph) = self.paragraph_mut(id) {
            for (i, local, insert, delete_as) in steps {
                paragraph.runs[i].splice(local, insert, delete_as);
            }
        }
        Ok(())
    }

    /// Serialize the package with every mutated run written back.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RevisionError> {
        let mut dirty: Vec<&Run> = self
            .paragraphs()
            .into_iter()
            .flat_map(|p| p.runs.iter())
            .filter(|r| r.dirty)
            .collect();
        if dirty.is_empty() {
            return Ok(self.package.clone());
        }
        dirty.sort_by_key(|r| r.source.start);

        let mut builder = Builder::new(self.xml.len());
        for run in dirty {
            builder.replace(run.source.clone(), Rope::from(write::run_xml(run)));
        }
        let xml = builder.build().apply(&self.xml).to_string();

        package::replace_part(&self.package, package::DOCUMENT_PART, xml.as_bytes())
    }

    /// Current text of the main document part, mutations applied.
    pub fn document_xml(&self) -> Result<String, RevisionError> {
        let bytes = self.to_bytes()?;
        package::read_part(&bytes, package::DOCUMENT_PART)
    }
}
