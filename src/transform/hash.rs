// src/transform/hash.rs

use std::path::Path;

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;

/// Compute the hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let bytes = fs.read(path)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Hash of a step's inputs plus everything else that shapes its output.
///
/// Unlike watch-style content hashes, order matters here: inputs are hashed
/// in path-set order since concatenation order changes the output. Each file
/// contributes its path and its content hash; `salt` carries the step's own
/// settings (command line, destination).
pub fn compute_inputs_hash<P: AsRef<Path>>(
    fs: &dyn FileSystem,
    inputs: &[P],
    salt: &str,
) -> Result<String> {
    let mut hasher = Hasher::new();
    hasher.update(salt.as_bytes());

    for path in inputs {
        let path = path.as_ref();
        if fs.is_file(path) {
            let file_hash = compute_file_hash(fs, path)?;
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update(file_hash.as_bytes());
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, inputs = inputs.len(), "computed inputs hash");
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn hash_depends_on_content_order_and_salt() {
        let fs = MockFileSystem::new();
        fs.add_file("a.js", "a");
        fs.add_file("b.js", "b");

        let ab = compute_inputs_hash(&fs, &["a.js", "b.js"], "cmd").unwrap();
        let ba = compute_inputs_hash(&fs, &["b.js", "a.js"], "cmd").unwrap();
        let salted = compute_inputs_hash(&fs, &["a.js", "b.js"], "other").unwrap();
        assert_ne!(ab, ba);
        assert_ne!(ab, salted);
        assert_eq!(ab, compute_inputs_hash(&fs, &["a.js", "b.js"], "cmd").unwrap());

        fs.add_file("a.js", "changed");
        assert_ne!(ab, compute_inputs_hash(&fs, &["a.js", "b.js"], "cmd").unwrap());
    }
}
