//! Schema view of the message template registry and the decode surface.
//!
//! The template loader and the wire codec live outside this crate; the tap
//! reaches them through [`TemplateCodec`]. Everything here is a read-only
//! view: a resolved [`MessageTemplate`] describes the shape of one decoded
//! message, and [`FieldValue`] carries one decoded field.

use msgtap_common::{Host, MAX_PACKET_SIZE};
use std::net::Ipv4Addr;
use uuid::Uuid;

/// Wire type of a single template variable. This is a closed set: the
/// template grammar cannot introduce new types at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WireType {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
    Vector3,
    Vector3d,
    Vector4,
    Quaternion,
    Uuid,
    Bool,
    IpAddr,
    IpPort,
    /// Length-prefixed binary blob.
    Variable,
    /// Fixed-length binary blob.
    Fixed,
}

/// One named variable within a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateVariable {
    pub name: String,
    pub wire_type: WireType,
}

/// A named, possibly-repeated group of variables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TemplateBlock {
    pub name: String,
    pub variables: Vec<TemplateVariable>,
}

/// The resolved template for one decoded message: canonical name plus the
/// ordered block/variable layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageTemplate {
    pub name: String,
    pub blocks: Vec<TemplateBlock>,
}

impl MessageTemplate {
    pub fn new(name: impl Into<String>, blocks: Vec<TemplateBlock>) -> Self {
        Self {
            name: name.into(),
            blocks,
        }
    }
}

/// A decoded field value, one variant per [`WireType`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    F32(f32),
    F64(f64),
    Vector3([f32; 3]),
    Vector3d([f64; 3]),
    Vector4([f32; 4]),
    Quaternion([f32; 4]),
    Uuid(Uuid),
    Bool(bool),
    IpAddr(Ipv4Addr),
    IpPort(u16),
    Variable(Vec<u8>),
    Fixed(Vec<u8>),
}

/// An owned expansion buffer with capacity [`MAX_PACKET_SIZE`] and a
/// separate logical length. Zero-code expansion runs in place, so the
/// buffer must be pre-sized to the maximum a packet can grow to.
pub struct ScratchBuffer {
    data: Vec<u8>,
    len: usize,
}

impl ScratchBuffer {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    /// Copies a raw payload in, truncating at capacity.
    pub fn load(&mut self, payload: &[u8]) {
        let n = payload.len().min(self.data.len());
        self.data[..n].copy_from_slice(&payload[..n]);
        self.len = n;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Full-capacity view for in-place expansion. Pair with [`set_len`]
    /// once the expanded length is known.
    ///
    /// [`set_len`]: ScratchBuffer::set_len
    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.data.len());
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// The external decode primitives, consumed as a black box.
///
/// A codec is stateful: `validate` then `decode` load one message, after
/// which `template`, `block_count` and `read` inspect it until the next
/// `clear`. Long-lived codecs (the tamper path keeps one around) must be
/// `clear`ed before each reuse so no field cursor leaks across calls.
pub trait TemplateCodec {
    /// In-place run-length expansion of zero bytes. The primitive checks
    /// the zero-code header flag itself and leaves unflagged buffers alone.
    fn expand_zero_code(&self, scratch: &mut ScratchBuffer);

    /// Schema-level structural check of an expanded buffer.
    fn validate(&mut self, buf: &[u8], from: &Host) -> bool;

    /// Populates the field cursor from a structurally valid buffer.
    fn decode(&mut self, buf: &[u8], from: &Host) -> bool;

    /// The resolved template of the currently decoded message, if any.
    fn template(&self) -> Option<&MessageTemplate>;

    /// Repeat count for a block in the currently decoded message.
    fn block_count(&self, block: &str) -> usize;

    /// One decoded field, keyed by block name, variable name and repeat
    /// index.
    fn read(&self, block: &str, variable: &str, index: usize) -> Option<FieldValue>;

    /// Drops any decoded state.
    fn clear(&mut self);
}

/// A codec with no schema loaded: validation always fails, so every packet
/// renders through the hex-dump fallback. This is what the raw tap binary
/// runs with.
pub struct NullCodec;

impl TemplateCodec for NullCodec {
    fn expand_zero_code(&self, _scratch: &mut ScratchBuffer) {}

    fn validate(&mut self, _buf: &[u8], _from: &Host) -> bool {
        false
    }

    fn decode(&mut self, _buf: &[u8], _from: &Host) -> bool {
        false
    }

    fn template(&self) -> Option<&MessageTemplate> {
        None
    }

    fn block_count(&self, _block: &str) -> usize {
        0
    }

    fn read(&self, _block: &str, _variable: &str, _index: usize) -> Option<FieldValue> {
        None
    }

    fn clear(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_load_and_len() {
        let mut scratch = ScratchBuffer::new();
        assert_eq!(scratch.capacity(), MAX_PACKET_SIZE);
        scratch.load(&[9, 8, 7]);
        assert_eq!(scratch.bytes(), &[9, 8, 7]);
        assert_eq!(scratch.len(), 3);
    }

    #[test]
    fn test_scratch_truncates_at_capacity() {
        let mut scratch = ScratchBuffer::new();
        let oversized = vec![0xAAu8; MAX_PACKET_SIZE + 100];
        scratch.load(&oversized);
        assert_eq!(scratch.len(), MAX_PACKET_SIZE);
    }

    #[test]
    fn test_scratch_set_len_is_clamped() {
        let mut scratch = ScratchBuffer::new();
        scratch.set_len(MAX_PACKET_SIZE * 2);
        assert_eq!(scratch.len(), MAX_PACKET_SIZE);
    }
}
