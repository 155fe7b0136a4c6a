//! Peer identity derived from an iroh public key
//!
//! This is the logical identity carried alongside a bridged connection; it is
//! never squeezed into a socket address.

use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use iroh::PublicKey;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Peer identity based on iroh's Ed25519 public key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IrohIdentity(pub(crate) PublicKey);

impl IrohIdentity {
    pub fn new(public_key: PublicKey) -> Self {
        Self(public_key)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.0
    }

    /// Create from a 32-byte array
    pub fn from_array(bytes: [u8; 32]) -> Result<Self, IdentityError> {
        PublicKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|e| IdentityError::InvalidFormat(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            })?;
        Self::from_array(arr)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Abbreviated form for log lines
    pub fn short_id(&self) -> String {
        self.0.fmt_short().to_string()
    }
}

impl FromStr for IrohIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PublicKey::from_str(s)
            .map(Self)
            .map_err(|e| IdentityError::InvalidFormat(e.to_string()))
    }
}

impl Debug for IrohIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IrohIdentity({})", self.0.fmt_short())
    }
}

impl Display for IrohIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Hash for IrohIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_bytes().hash(state);
    }
}

impl Serialize for IrohIdentity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(self.0.as_bytes())
    }
}

impl<'de> Deserialize<'de> for IrohIdentity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes: Vec<u8> = Deserialize::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl From<PublicKey> for IrohIdentity {
    fn from(key: PublicKey) -> Self {
        Self(key)
    }
}

impl From<IrohIdentity> for PublicKey {
    fn from(id: IrohIdentity) -> Self {
        id.0
    }
}
