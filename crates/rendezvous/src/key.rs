#[cfg(test)]
#[path = "tests/key.rs"]
mod tests;

use core::fmt;

use sha2::{Digest, Sha256};

// Multihash header for a 32 byte sha2-256 digest.
const SHA2_256_CODE: u8 = 0x12;
const SHA2_256_LEN: u8 = 32;

const KEY_LEN: usize = 34;

/// The DHT key every node sharing a rendezvous string provides and looks up.
///
/// It is the sha2-256 multihash of the UTF-8 string, which is also the key a
/// CIDv1 (raw, sha2-256) of the same bytes resolves to in a Kademlia provider
/// record. Every node must derive it exactly this way or it will never meet
/// its peers.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RendezvousKey([u8; KEY_LEN]);

impl RendezvousKey {
    #[must_use]
    pub fn derive(rendezvous: &str) -> Self {
        let digest = Sha256::digest(rendezvous.as_bytes());

        let mut key = [0; KEY_LEN];
        key[0] = SHA2_256_CODE;
        key[1] = SHA2_256_LEN;
        key[2..].copy_from_slice(&digest);

        Self(key)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The raw sha2-256 digest without the multihash header.
    #[must_use]
    pub fn digest(&self) -> &[u8] {
        &self.0[2..]
    }
}

impl From<&str> for RendezvousKey {
    fn from(rendezvous: &str) -> Self {
        Self::derive(rendezvous)
    }
}

impl AsRef<[u8]> for RendezvousKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Display for RendezvousKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for RendezvousKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RendezvousKey")
            .field(&format_args!("{self}"))
            .finish()
    }
}
