//! Built-in PDF object graph scanner
//!
//! A byte-level scanner, not a full PDF parser: it is tolerant of the truncated and
//! malformed files common in malware corpora and extracts just enough structure to
//! fingerprint a file. Revisions are split at `%%EOF` markers, objects are found by
//! their `N G obj ... endobj` framing, and edges are the indirect references in each
//! object's dictionary.

use super::{Analyzer, DocObject, Document, NodeInfo, ObjectId, Revision};
use crate::error::AnalysisError;
use regex::bytes::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

/// The header must appear within this many leading bytes
const HEADER_WINDOW: usize = 1024;

static OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s-u)(\d+)\s+(\d+)\s+obj\b(.*?)endobj").expect("valid regex"));
static STREAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s-u)^(.*?)\bstream\r?\n(.*?)\r?\n?endstream").expect("valid regex"));
static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)(\d+)\s+(\d+)\s+R\b").expect("valid regex"));
static TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Type\s*/([A-Za-z0-9_.#\-]+)").expect("valid regex"));
static ROOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Root\s+(\d+)\s+\d+\s+R").expect("valid regex"));
static JS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?-u)/JS\s*").expect("valid regex"));
static JS_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)^(\d+)\s+\d+\s+R").expect("valid regex"));
static FILTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Filter\s*(\[)?\s*/([A-Za-z0-9]+)\s*(/)?").expect("valid regex"));

/// Analyzer backed by the built-in PDF scanner
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfAnalyzer;

impl Analyzer for PdfAnalyzer {
    type Document = PdfDocument;

    fn parse(&self, path: &Path) -> Result<PdfDocument, AnalysisError> {
        let data = std::fs::read(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        PdfDocument::from_bytes(&data)
    }
}

/// Script reference resolved once every object of the file is known
enum ScriptSource {
    Inline(String),
    Indirect(ObjectId),
    Unreadable,
}

struct RawObject {
    id: ObjectId,
    node: NodeInfo,
    is_stream: bool,
    stream: Option<Vec<u8>>,
    script: Option<ScriptSource>,
}

/// Parsed object graph of one PDF file
#[derive(Debug, Clone, Default)]
pub struct PdfDocument {
    revisions: Vec<Revision>,
    objects: Vec<HashMap<ObjectId, DocObject>>,
    scripts: Vec<Vec<ObjectId>>,
    streams: Vec<Vec<ObjectId>>,
}

impl PdfDocument {
    pub fn from_bytes(data: &[u8]) -> Result<Self, AnalysisError> {
        let window = &data[..data.len().min(HEADER_WINDOW)];
        if find(window, b"%PDF-").is_none() {
            return Err(AnalysisError::Unsupported("missing %PDF- header".to_string()));
        }

        let mut document = PdfDocument::default();
        let mut sections = split_revisions(data);
        // Bytes after the last %%EOF only count when they hold objects
        if sections.len() > 1
            && let Some(last) = sections.last()
            && !OBJECT_RE.is_match(last)
        {
            sections.pop();
        }

        let parsed: Vec<(Option<ObjectId>, Vec<RawObject>)> = sections
            .into_iter()
            .map(|section| {
                let raw_objects = OBJECT_RE
                    .captures_iter(section)
                    .filter_map(|caps| {
                        let id = parse_number(&caps[1])?;
                        Some(parse_object(id, &caps[3]))
                    })
                    .collect();
                let root = ROOT_RE
                    .captures_iter(section)
                    .last()
                    .and_then(|caps| parse_number(&caps[1]));
                (root, raw_objects)
            })
            .collect();

        // Only streams that some /JS entry points at are kept as script text
        let targets = indirect_script_targets(parsed.iter().flat_map(|(_, raw)| raw));
        let mut resolved: HashMap<ObjectId, String> = HashMap::new();
        for (root, raw_objects) in parsed {
            for raw in &raw_objects {
                if let Some(stream) = raw.stream.as_deref().filter(|_| targets.contains(&raw.id)) {
                    resolved.insert(raw.id, String::from_utf8_lossy(stream).into_owned());
                }
            }
            document.push_revision(root, raw_objects, &resolved);
        }

        if document.revisions.iter().all(|r| r.nodes.is_empty()) {
            return Err(AnalysisError::Parse("no indirect objects found".to_string()));
        }
        Ok(document)
    }

    fn push_revision(
        &mut self,
        root: Option<ObjectId>,
        raw_objects: Vec<RawObject>,
        resolved: &HashMap<ObjectId, String>,
    ) {
        let mut revision = Revision {
            root,
            ..Revision::default()
        };
        let mut objects = HashMap::new();
        let mut scripts = Vec::new();
        let mut streams = Vec::new();

        for raw in raw_objects {
            let script = raw.script.map(|source| match source {
                ScriptSource::Inline(code) => code,
                ScriptSource::Indirect(target) => resolved.get(&target).cloned().unwrap_or_default(),
                ScriptSource::Unreadable => String::new(),
            });
            if script.is_some() && !scripts.contains(&raw.id) {
                scripts.push(raw.id);
            }
            if raw.is_stream && !streams.contains(&raw.id) {
                streams.push(raw.id);
            }
            revision.nodes.insert(raw.id, raw.node);
            objects.insert(
                raw.id,
                DocObject {
                    id: raw.id,
                    script,
                    stream: raw.stream,
                },
            );
        }

        self.revisions.push(revision);
        self.objects.push(objects);
        self.scripts.push(scripts);
        self.streams.push(streams);
    }
}

impl Document for PdfDocument {
    fn revisions(&self) -> &[Revision] {
        &self.revisions
    }

    fn script_objects(&self, version: usize) -> Vec<ObjectId> {
        self.scripts.get(version).cloned().unwrap_or_default()
    }

    fn stream_objects(&self, version: usize) -> Vec<ObjectId> {
        self.streams.get(version).cloned().unwrap_or_default()
    }

    fn object(&self, version: usize, id: ObjectId) -> Option<&DocObject> {
        self.objects.get(version)?.get(&id)
    }
}

fn indirect_script_targets<'a>(raw_objects: impl Iterator<Item = &'a RawObject>) -> HashSet<ObjectId> {
    raw_objects
        .filter_map(|raw| match raw.script {
            Some(ScriptSource::Indirect(target)) => Some(target),
            _ => None,
        })
        .collect()
}

/// Split at every `%%EOF`, keeping the marker with the section it closes
fn split_revisions(data: &[u8]) -> Vec<&[u8]> {
    const EOF_MARKER: &[u8] = b"%%EOF";
    let mut sections = Vec::new();
    let mut start = 0;
    while let Some(offset) = find(&data[start..], EOF_MARKER) {
        let end = start + offset + EOF_MARKER.len();
        sections.push(&data[start..end]);
        start = end;
    }
    if start < data.len() || sections.is_empty() {
        sections.push(&data[start..]);
    }
    sections
}

fn parse_object(id: ObjectId, body: &[u8]) -> RawObject {
    let (dictionary, stream_bytes) = match STREAM_RE.captures(body) {
        Some(caps) => {
            let dictionary = caps.get(1).map_or(&body[..0], |m| m.as_bytes());
            let payload = caps.get(2).map_or(&body[..0], |m| m.as_bytes());
            (dictionary, Some(payload))
        }
        None => (body, None),
    };

    let kind = match TYPE_RE.captures(dictionary) {
        Some(caps) => format!("/{}", String::from_utf8_lossy(&caps[1])),
        None if stream_bytes.is_some() => "stream".to_string(),
        None => value_kind(dictionary).to_string(),
    };

    let mut children = Vec::new();
    for caps in REFERENCE_RE.captures_iter(dictionary) {
        if let Some(child) = parse_number(&caps[1])
            && child != id
            && !children.contains(&child)
        {
            children.push(child);
        }
    }

    RawObject {
        id,
        node: NodeInfo::new(kind, children),
        is_stream: stream_bytes.is_some(),
        stream: stream_bytes.and_then(|payload| decode_stream(dictionary, payload)),
        script: script_source(dictionary),
    }
}

fn value_kind(body: &[u8]) -> &'static str {
    let trimmed = body.trim_ascii_start();
    match trimmed.first() {
        Some(b'<') if trimmed.starts_with(b"<<") => "dictionary",
        Some(b'<') | Some(b'(') => "string",
        Some(b'[') => "array",
        Some(b'/') => "name",
        Some(c) if c.is_ascii_digit() || *c == b'-' || *c == b'+' || *c == b'.' => "number",
        Some(b't') | Some(b'f') => "boolean",
        Some(b'n') => "null",
        _ => "object",
    }
}

fn script_source(dictionary: &[u8]) -> Option<ScriptSource> {
    let js = JS_RE.find(dictionary)?;
    let rest = &dictionary[js.end()..];
    let source = match rest.first() {
        Some(b'(') => ScriptSource::Inline(read_literal_string(&rest[1..])),
        Some(b'<') if !rest.starts_with(b"<<") => match read_hex_string(&rest[1..]) {
            Some(bytes) => ScriptSource::Inline(String::from_utf8_lossy(&bytes).into_owned()),
            None => ScriptSource::Unreadable,
        },
        _ => match JS_REF_RE.captures(rest).and_then(|caps| parse_number(&caps[1])) {
            Some(target) => ScriptSource::Indirect(target),
            None => ScriptSource::Unreadable,
        },
    };
    Some(source)
}

/// Decode a stream payload; only unfiltered and ASCIIHex streams are supported
fn decode_stream(dictionary: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    match FILTER_RE.captures(dictionary) {
        None => Some(payload.to_vec()),
        // A second name inside a filter array means a chain we cannot decode
        Some(caps) if caps.get(1).is_some() && caps.get(3).is_some() => None,
        Some(caps) if matches!(&caps[2], b"ASCIIHexDecode" | b"AHx") => read_hex_string(payload),
        Some(_) => None,
    }
}

/// Body of a literal string, starting just after its opening parenthesis
fn read_literal_string(input: &[u8]) -> String {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut bytes = input.iter().copied().peekable();

    while let Some(byte) = bytes.next() {
        match byte {
            b'\\' => match bytes.next() {
                Some(b'n') => out.push(b'\n'),
                Some(b'r') => out.push(b'\r'),
                Some(b't') => out.push(b'\t'),
                Some(b'b') => out.push(0x08),
                Some(b'f') => out.push(0x0c),
                Some(b'\r') | Some(b'\n') => {}
                Some(digit @ b'0'..=b'7') => {
                    let mut value = u32::from(digit - b'0');
                    for _ in 0..2 {
                        match bytes.peek() {
                            Some(next @ b'0'..=b'7') => {
                                value = value * 8 + u32::from(next - b'0');
                                bytes.next();
                            }
                            _ => break,
                        }
                    }
                    out.push((value & 0xff) as u8);
                }
                Some(other) => out.push(other),
                None => break,
            },
            b'(' => {
                depth += 1;
                out.push(byte);
            }
            b')' if depth == 0 => break,
            b')' => {
                depth -= 1;
                out.push(byte);
            }
            _ => out.push(byte),
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Hex string body up to `>` (or the end), whitespace ignored, odd digit padded
fn read_hex_string(input: &[u8]) -> Option<Vec<u8>> {
    let mut digits = Vec::new();
    for &byte in input {
        match byte {
            b'>' => break,
            b if b.is_ascii_whitespace() => continue,
            b if b.is_ascii_hexdigit() => digits.push(hex_value(b)),
            _ => return None,
        }
    }
    if digits.len() % 2 == 1 {
        digits.push(0);
    }
    Some(digits.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

fn parse_number(digits: &[u8]) -> Option<ObjectId> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{extract_embedded_binaries, extract_scripts, render_tree};

    const SIMPLE: &[u8] = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R /OpenAction 4 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 5 0 R >>\nendobj\n\
4 0 obj\n<< /S /JavaScript /JS (app.alert\\(\"hi\"\\);) >>\nendobj\n\
5 0 obj\n<< /Length 11 >>\nstream\nBT /F1 Tf\nendstream\nendobj\n\
trailer\n<< /Root 1 0 R >>\n%%EOF\n";

    #[test]
    fn test_simple_document_tree() {
        let doc = PdfDocument::from_bytes(SIMPLE).unwrap();
        assert_eq!(doc.revisions().len(), 1);
        assert_eq!(doc.revisions()[0].root, Some(1));
        assert_eq!(
            render_tree(doc.revisions()),
            "/Catalog (1) /Pages (2) /Page (3) /Pages (2) stream (5) dictionary (4) "
        );
    }

    #[test]
    fn test_inline_script_extracted() {
        let doc = PdfDocument::from_bytes(SIMPLE).unwrap();
        assert_eq!(doc.script_objects(0), vec![4]);
        assert_eq!(extract_scripts(&doc), "app.alert(\"hi\");");
        assert_eq!(extract_embedded_binaries(&doc), "");
    }

    #[test]
    fn test_incremental_update_adds_revision() {
        let mut data = SIMPLE.to_vec();
        data.extend_from_slice(
            b"6 0 obj\n<< /JS 7 0 R /S /JavaScript >>\nendobj\n\
7 0 obj\n<< /Length 9 >>\nstream\nthis.x=1;\nendstream\nendobj\n\
8 0 obj\n<< /Type /EmbeddedFile /Filter /ASCIIHexDecode >>\nstream\n4657530a>\nendstream\nendobj\n\
trailer\n<< /Root 1 0 R /Prev 9 >>\n%%EOF\n",
        );
        let doc = PdfDocument::from_bytes(&data).unwrap();
        assert_eq!(doc.revisions().len(), 2);
        assert_eq!(doc.script_objects(1), vec![6]);
        assert_eq!(extract_scripts(&doc), "app.alert(\"hi\");this.x=1;");
        assert_eq!(extract_embedded_binaries(&doc), "4657530a");
        assert!(render_tree(doc.revisions()).contains(" Version 1: "));
    }

    #[test]
    fn test_only_referenced_streams_resolve_as_scripts() {
        let data = b"%PDF-1.4\n\
1 0 obj\n<< /JS 2 0 R >>\nendobj\n\
2 0 obj\n<< /Length 5 >>\nstream\nrun()\nendstream\nendobj\n\
3 0 obj\n<< /Length 4 >>\nstream\ndata\nendstream\nendobj\n";
        let raw: Vec<RawObject> = OBJECT_RE
            .captures_iter(data)
            .filter_map(|caps| Some(parse_object(parse_number(&caps[1])?, &caps[3])))
            .collect();
        assert_eq!(indirect_script_targets(raw.iter()), HashSet::from([2]));

        let doc = PdfDocument::from_bytes(data).unwrap();
        assert_eq!(doc.object(0, 1).unwrap().script_code(), Some("run()"));
        assert_eq!(doc.object(0, 3).unwrap().decoded_stream(), Some(&b"data"[..]));
        assert_eq!(doc.script_objects(0), vec![1]);
    }

    #[test]
    fn test_filtered_streams_are_not_decoded() {
        let data = b"%PDF-1.5\n1 0 obj\n<< /Filter /FlateDecode >>\nstream\nMZxyz\nendstream\nendobj\n";
        let doc = PdfDocument::from_bytes(data).unwrap();
        assert_eq!(doc.stream_objects(0), vec![1]);
        assert_eq!(doc.object(0, 1).unwrap().decoded_stream(), None);
        assert_eq!(extract_embedded_binaries(&doc), "");
    }

    #[test]
    fn test_rejects_non_pdf() {
        let result = PdfDocument::from_bytes(b"MZ\x90\x00 not a document");
        assert!(matches!(result, Err(AnalysisError::Unsupported(_))));
    }

    #[test]
    fn test_rejects_header_only_file() {
        let result = PdfDocument::from_bytes(b"%PDF-1.7\n%%EOF\n");
        assert!(matches!(result, Err(AnalysisError::Parse(_))));
    }

    #[test]
    fn test_literal_string_escapes() {
        assert_eq!(read_literal_string(b"a\\)b(c)d) tail"), "a)b(c)d");
        assert_eq!(read_literal_string(b"\\101\\n)"), "A\n");
    }

    #[test]
    fn test_hex_string() {
        assert_eq!(read_hex_string(b"48 65 6c6C6f>"), Some(b"Hello".to_vec()));
        assert_eq!(read_hex_string(b"7>"), Some(vec![0x70]));
        assert_eq!(read_hex_string(b"zz>"), None);
    }
}
