use std::fmt;

use sha2::{Digest, Sha256};

/// Short digest identifying an application build. Channel names embed it so
/// two different builds running side by side never share a pipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFingerprint(String);

impl BuildFingerprint {
    /// First 8 bytes of `sha256(name + "@" + version)`, hex encoded.
    pub fn derive(name: &str, version: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(b"@");
        hasher.update(version.as_bytes());
        let digest = hasher.finalize();
        Self(digest[..8].iter().map(|b| format!("{b:02x}")).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hex_and_sixteen_chars() {
        let fp = BuildFingerprint::derive("app", "1.0.0");
        assert_eq!(fp.as_str().len(), 16);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_changes_with_version() {
        let a = BuildFingerprint::derive("app", "1.0.0");
        let b = BuildFingerprint::derive("app", "1.0.1");
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_separates_name_and_version() {
        let a = BuildFingerprint::derive("ab", "c");
        let b = BuildFingerprint::derive("a", "bc");
        assert_ne!(a, b);
    }
}
