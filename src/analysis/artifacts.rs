//! Auxiliary artifact extraction
//!
//! Each artifact type is flattened into one string per file: the concatenation, in
//! the order the document reports them, of every matching fragment across all
//! versions.

use super::Document;
use std::fmt::Write;

/// Known magic prefixes of binaries embedded in document streams
pub const BINARY_MAGIC: &[(&str, &[u8])] = &[
    ("swf", b"FWS"),
    ("swf-zlib", b"CWS"),
    ("swf-lzma", b"ZWS"),
    ("pe", b"MZ"),
    ("elf", b"\x7fELF"),
    ("zip", b"PK\x03\x04"),
    ("ole", b"\xd0\xcf\x11\xe0"),
];

/// Name of the embedded binary format `payload` starts with, if known
pub fn binary_kind(payload: &[u8]) -> Option<&'static str> {
    BINARY_MAGIC
        .iter()
        .find(|(_, magic)| payload.starts_with(magic))
        .map(|(name, _)| *name)
}

/// Concatenated script code of every script-bearing object
pub fn extract_scripts<D: Document + ?Sized>(document: &D) -> String {
    let mut scripts = String::new();
    for version in 0..document.revisions().len() {
        for id in document.script_objects(version) {
            let code = document
                .object(version, id)
                .filter(|object| object.contains_script())
                .and_then(|object| object.script_code());
            if let Some(code) = code {
                scripts.push_str(code);
            }
        }
    }
    scripts
}

/// Concatenated hex of every decoded stream starting with a known binary magic
pub fn extract_embedded_binaries<D: Document + ?Sized>(document: &D) -> String {
    let mut binaries = String::new();
    for version in 0..document.revisions().len() {
        for id in document.stream_objects(version) {
            let Some(payload) = document.object(version, id).and_then(|o| o.decoded_stream()) else {
                continue;
            };
            if let Some(kind) = binary_kind(payload) {
                tracing::debug!(object = id, version, kind, bytes = payload.len(), "Embedded binary found");
                push_hex(&mut binaries, payload);
            }
        }
    }
    binaries
}

fn push_hex(out: &mut String, bytes: &[u8]) {
    out.reserve(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DocObject, ObjectId, Revision};
    use std::collections::HashMap;

    /// Two versions with objects keyed by (version, id)
    struct StubDocument {
        revisions: Vec<Revision>,
        objects: HashMap<(usize, ObjectId), DocObject>,
        order: Vec<(usize, ObjectId)>,
    }

    impl StubDocument {
        fn new(objects: Vec<(usize, DocObject)>) -> Self {
            let order = objects.iter().map(|(v, o)| (*v, o.id)).collect();
            Self {
                revisions: vec![Revision::default(), Revision::default()],
                objects: objects.into_iter().map(|(v, o)| ((v, o.id), o)).collect(),
                order,
            }
        }

        fn ids(&self, version: usize, keep: impl Fn(&DocObject) -> bool) -> Vec<ObjectId> {
            self.order
                .iter()
                .filter(|(v, id)| *v == version && keep(&self.objects[&(*v, *id)]))
                .map(|(_, id)| *id)
                .collect()
        }
    }

    impl Document for StubDocument {
        fn revisions(&self) -> &[Revision] {
            &self.revisions
        }

        fn script_objects(&self, version: usize) -> Vec<ObjectId> {
            self.ids(version, |o| o.contains_script())
        }

        fn stream_objects(&self, version: usize) -> Vec<ObjectId> {
            self.ids(version, |o| o.stream.is_some())
        }

        fn object(&self, version: usize, id: ObjectId) -> Option<&DocObject> {
            self.objects.get(&(version, id))
        }
    }

    fn script(id: ObjectId, code: &str) -> DocObject {
        DocObject {
            id,
            script: Some(code.to_string()),
            stream: None,
        }
    }

    fn stream(id: ObjectId, bytes: &[u8]) -> DocObject {
        DocObject {
            id,
            script: None,
            stream: Some(bytes.to_vec()),
        }
    }

    #[test]
    fn test_scripts_concatenated_in_reported_order() {
        let doc = StubDocument::new(vec![
            (0, script(4, "app.alert(1);")),
            (0, script(2, "var x = 2;")),
            (1, script(9, "this.exportDataObject();")),
        ]);
        assert_eq!(
            extract_scripts(&doc),
            "app.alert(1);var x = 2;this.exportDataObject();"
        );
    }

    #[test]
    fn test_only_magic_streams_extracted() {
        let doc = StubDocument::new(vec![
            (0, stream(1, b"BT /F1 12 Tf ET")),
            (0, stream(2, b"CWS\x0a")),
            (1, stream(3, b"MZ\x90")),
        ]);
        assert_eq!(extract_embedded_binaries(&doc), "4357530a4d5a90");
    }

    #[test]
    fn test_empty_document_yields_empty_artifacts() {
        let doc = StubDocument::new(Vec::new());
        assert_eq!(extract_scripts(&doc), "");
        assert_eq!(extract_embedded_binaries(&doc), "");
    }

    #[test]
    fn test_binary_kind() {
        assert_eq!(binary_kind(b"FWS\x09"), Some("swf"));
        assert_eq!(binary_kind(b"\x7fELF\x02"), Some("elf"));
        assert_eq!(binary_kind(b"%PDF-1.7"), None);
        assert_eq!(binary_kind(b""), None);
    }
}
