//! Content identifiers and structural fingerprints
//!
//! Both are lowercase hex SHA-256 digests. The fingerprint hashes the rendered tree
//! text only, so two files with the same object structure share a fingerprint across
//! runs and machines.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const READ_CHUNK: usize = 1024 * 1024;

/// SHA-256 of the file contents, read in 1MB chunks
pub fn content_id(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Structural fingerprint of a rendered tree
pub fn tree_fingerprint(tree_text: &str) -> String {
    format!("{:x}", Sha256::digest(tree_text.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_content_id_matches_digest() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sample.pdf");
        fs::write(&path, b"test content").unwrap();

        let expected = format!("{:x}", Sha256::digest(b"test content"));
        assert_eq!(content_id(&path).unwrap(), expected);
    }

    #[test]
    fn test_content_id_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(content_id(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_tree_fingerprint_is_stable() {
        let tree = "/Catalog (1) /Pages (2) ";
        assert_eq!(tree_fingerprint(tree), tree_fingerprint(tree));
        assert_eq!(tree_fingerprint(tree).len(), 64);
        assert_ne!(tree_fingerprint(tree), tree_fingerprint("/Catalog (1) "));
        // Well-known digest of the empty string
        assert_eq!(
            tree_fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
