//! # Canonical Encoding
//!
//! A tiny append-only writer used for everything that is hashed or signed.
//! Integers are little-endian, variable-length fields carry a `u64` length
//! prefix, optional fields a one-byte presence tag.

/// Types with a canonical byte encoding.
pub trait Canonical {
    /// Append the canonical encoding of `self` to `w`.
    fn encode(&self, w: &mut CanonicalWriter);

    /// Canonical encoding as a fresh buffer.
    fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = CanonicalWriter::new();
        self.encode(&mut w);
        w.into_bytes()
    }
}

/// Byte sink for [`Canonical`] encodings.
#[derive(Debug, Default)]
pub struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    /// Empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a one-byte tag.
    pub fn put_tag(&mut self, tag: u8) -> &mut Self {
        self.buf.push(tag);
        self
    }

    /// Append a little-endian `u64`.
    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append fixed-width bytes without a length prefix.
    pub fn put_fixed(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append length-prefixed bytes.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.put_u64(bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Append a length-prefixed UTF-8 string.
    pub fn put_str(&mut self, value: &str) -> &mut Self {
        self.put_bytes(value.as_bytes())
    }

    /// Append an optional string.
    pub fn put_opt_str(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.put_tag(1).put_str(v),
            None => self.put_tag(0),
        }
    }

    /// Append a length-prefixed sequence.
    pub fn put_seq<T: Canonical>(&mut self, items: &[T]) -> &mut Self {
        self.put_u64(items.len() as u64);
        for item in items {
            item.encode(self);
        }
        self
    }

    /// Finished bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
