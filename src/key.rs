//! # Registration keys.
//!
//! A [`RegistrationKey`] is the standard (padded) base64 text of an invoice
//! payment hash. Clients use it as the token when they open a listening
//! connection, and the dispatcher computes the same text from every incoming
//! invoice to find the listener.
//!
//! Registration is permissive: any string is accepted as a key, so a client may
//! register before the invoice exists. Only [`RegistrationKey::decode`] checks
//! the encoding.
//!
//! ## Example
//! ```rust
//! use invoicewatch::RegistrationKey;
//!
//! let key = RegistrationKey::from_identifier(b"hello");
//! assert_eq!(key.as_str(), "aGVsbG8=");
//! assert_eq!(key.decode().unwrap(), b"hello");
//! ```

use std::borrow::Borrow;
use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Text key under which a listener is registered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationKey(String);

impl RegistrationKey {
    /// Wraps a client-supplied key as-is.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Encodes a payment hash into its key.
    pub fn from_identifier(identifier: &[u8]) -> Self {
        Self(BASE64.encode(identifier))
    }

    /// Decodes the key back into the payment hash.
    pub fn decode(&self) -> Result<Vec<u8>, KeyError> {
        BASE64.decode(self.0.as_bytes()).map_err(|e| KeyError {
            key: self.0.clone(),
            error: e.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RegistrationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for RegistrationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for RegistrationKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RegistrationKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Serde adapter for byte fields carried as base64 text on the wire.
pub(crate) mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(d)?;
        BASE64.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}
