use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

pub const SECRET_KEY_LEN: usize = 32;

/// Per-view symmetric secret. The native host receives it with the
/// create-view directive and presents it when joining the socket hub.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey([u8; SECRET_KEY_LEN]);

impl SecretKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_random() {
        assert_ne!(SecretKey::generate(), SecretKey::generate());
    }

    #[test]
    fn base64_is_padded_standard_alphabet() {
        let key = SecretKey([0xff; SECRET_KEY_LEN]);
        let encoded = key.to_base64();
        assert_eq!(encoded.len(), 44);
        assert!(encoded.ends_with('='));
        assert_eq!(STANDARD.decode(&encoded).unwrap(), key.as_bytes());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = SecretKey([7; SECRET_KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SecretKey(..)");
    }
}
