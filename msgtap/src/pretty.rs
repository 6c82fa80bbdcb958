//! Human-readable rendering of captured packets.
//!
//! A [`PrettyMessage`] decorates a [`RawEntry`] with a decoded name, a
//! one-line summary for list display and, on demand, a full multi-line
//! dump. Decoding never fails outward: anything the schema cannot parse
//! degrades to a hex dump so the operator still sees the raw bytes.

use crate::template::{FieldValue, MessageTemplate, ScratchBuffer, TemplateCodec};
use msgtap_common::{
    Host, MessageKind, RawEntry, ACK_FLAG, MIN_VALID_PACKET_SIZE, RELIABLE_FLAG, RESENT_FLAG,
    ZERO_CODE_FLAG,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Character budget for one-line summaries. Once the accumulated text
/// exceeds this, remaining blocks are dropped and an ellipsis appended.
pub const SUMMARY_BUDGET: usize = 256;

/// Bytes of a binary blob inspected (and shown) in summary mode.
pub const TEXT_PREVIEW: usize = 64;

/// Bytes of a binary blob shown as hex in summary mode.
pub const HEX_PREVIEW: usize = 8;

/// Name given to packets the schema cannot parse.
pub const NAME_INVALID: &str = "Invalid";

/// Name given to non-template captures.
pub const NAME_UNSUPPORTED: &str = "Unsupported";

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Packet direction, inferred from the source host (see [`Host::is_local`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    pub fn of(from: &Host, listen_port: u16) -> Self {
        if from.is_local(listen_port) {
            Direction::Outgoing
        } else {
            Direction::Incoming
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::Incoming => "in",
            Direction::Outgoing => "out",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Verbosity {
    Summary,
    Full,
}

/// A decoded, display-ready view of one captured packet.
///
/// `name` and `summary` are computed once at construction; the full dump is
/// produced on demand because it is far more expensive and only ever needed
/// for the single selected entry.
#[derive(Clone, Debug)]
pub struct PrettyMessage {
    /// Fresh process-unique identifier, independent of list position.
    pub id: u64,
    pub sequence: u32,
    pub flags: u8,
    pub name: String,
    pub summary: String,
    entry: RawEntry,
    direction: Direction,
    listen_port: u16,
}

impl PrettyMessage {
    /// Decodes a capture. The codec is reset first, so a long-lived codec
    /// can be reused across calls.
    pub fn decode(entry: &RawEntry, codec: &mut dyn TemplateCodec, listen_port: u16) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let direction = Direction::of(&entry.from, listen_port);
        let (sequence, flags) = header_fields(&entry.data);

        if entry.kind != MessageKind::Template {
            return Self {
                id,
                sequence: 0,
                flags: 0,
                name: NAME_UNSUPPORTED.to_string(),
                summary: unsupported_placeholder(entry.kind),
                entry: entry.clone(),
                direction,
                listen_port,
            };
        }

        codec.clear();
        let (name, summary) = match decode_into(codec, entry) {
            Some(template) => {
                let summary = render_summary(codec, &template);
                (template.name, summary)
            }
            None => (NAME_INVALID.to_string(), fallback_dump(direction, &entry.data)),
        };

        Self {
            id,
            sequence,
            flags,
            name,
            summary,
            entry: entry.clone(),
            direction,
            listen_port,
        }
    }

    /// Full multi-line dump. Re-decodes the capture; on decode failure the
    /// result is the same hex dump the summary degraded to.
    pub fn full(&self, codec: &mut dyn TemplateCodec, show_header: bool) -> String {
        if self.entry.kind != MessageKind::Template {
            return unsupported_placeholder(self.entry.kind);
        }

        codec.clear();
        match decode_into(codec, &self.entry) {
            Some(template) => {
                let mut out = String::new();
                if show_header {
                    out.push_str(&format!(
                        "{} {} -> {} #{} [{}]\n",
                        self.direction.label(),
                        self.entry.from,
                        self.entry.to,
                        self.sequence,
                        flags_string(self.flags)
                    ));
                }
                out.push_str(&render_full(codec, &template));
                out
            }
            None => fallback_dump(self.direction, &self.entry.data),
        }
    }

    pub fn entry(&self) -> &RawEntry {
        &self.entry
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }
}

/// Resolves just the template name of a capture, or `None` when the packet
/// is not template traffic or cannot be decoded. The tamper path uses this
/// to key its rule lookup without paying for rendering.
pub fn decode_name(codec: &mut dyn TemplateCodec, entry: &RawEntry) -> Option<String> {
    if entry.kind != MessageKind::Template {
        return None;
    }
    codec.clear();
    decode_into(codec, entry).map(|template| template.name)
}

/// Runs expansion, validation and field decode, leaving the codec holding
/// the decoded message. Returns the resolved template (cloned, so callers
/// can keep reading fields through the codec while iterating it).
fn decode_into(codec: &mut dyn TemplateCodec, entry: &RawEntry) -> Option<MessageTemplate> {
    let mut scratch = ScratchBuffer::new();
    scratch.load(&entry.data);
    codec.expand_zero_code(&mut scratch);
    if scratch.len() < MIN_VALID_PACKET_SIZE {
        return None;
    }
    if !codec.validate(scratch.bytes(), &entry.from) {
        return None;
    }
    if !codec.decode(scratch.bytes(), &entry.from) {
        return None;
    }
    codec.template().cloned()
}

fn header_fields(data: &[u8]) -> (u32, u8) {
    if data.len() < 5 {
        return (0, data.first().copied().unwrap_or(0));
    }
    let sequence = u32::from_be_bytes([data[1], data[2], data[3], data[4]]);
    (sequence, data[0])
}

fn flags_string(flags: u8) -> String {
    let mut s = String::with_capacity(4);
    s.push(if flags & ZERO_CODE_FLAG != 0 { 'Z' } else { '-' });
    s.push(if flags & RELIABLE_FLAG != 0 { 'R' } else { '-' });
    s.push(if flags & RESENT_FLAG != 0 { 'S' } else { '-' });
    s.push(if flags & ACK_FLAG != 0 { 'A' } else { '-' });
    s
}

fn unsupported_placeholder(kind: MessageKind) -> String {
    match kind {
        MessageKind::HttpRequest => "(http request, not decoded)".to_string(),
        MessageKind::HttpResponse => "(http response, not decoded)".to_string(),
        MessageKind::Template => "(not decoded)".to_string(),
    }
}

/// Uppercase two-digit hex, one trailing space per byte: `[0x0A, 0xFF]`
/// renders as `"0A FF "`.
fn hex_dump(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for byte in data {
        out.push_str(&format!("{:02X} ", byte));
    }
    out
}

/// The operator's only window into packets the schema cannot parse, so the
/// raw bytes are never omitted.
fn fallback_dump(direction: Direction, data: &[u8]) -> String {
    format!("{}\t{}", direction.label(), hex_dump(data))
}

fn render_summary(codec: &dyn TemplateCodec, template: &MessageTemplate) -> String {
    let mut out = String::new();
    for block in &template.blocks {
        let repeats = codec.block_count(&block.name);
        if repeats == 0 {
            // a zero-repeat block contributes nothing
        } else if repeats > 1 {
            // repeated blocks get a count, no per-field detail
            append(&mut out, &format!("{}[x{}]", block.name, repeats));
        } else {
            for var in &block.variables {
                let text = codec
                    .read(&block.name, &var.name, 0)
                    .map(|value| format_value(&value, Verbosity::Summary))
                    .unwrap_or_else(|| "?".to_string());
                append(&mut out, &format!("{}={}", var.name, text));
            }
        }
        if out.len() > SUMMARY_BUDGET {
            out.push_str("...");
            break;
        }
    }
    out
}

fn render_full(codec: &dyn TemplateCodec, template: &MessageTemplate) -> String {
    let mut out = String::new();
    for block in &template.blocks {
        let repeats = codec.block_count(&block.name);
        for index in 0..repeats {
            if repeats > 1 {
                out.push_str(&format!("[{} #{}]\n", block.name, index));
            } else {
                out.push_str(&format!("[{}]\n", block.name));
            }
            for var in &block.variables {
                let text = codec
                    .read(&block.name, &var.name, index)
                    .map(|value| format_value(&value, Verbosity::Full))
                    .unwrap_or_else(|| "?".to_string());
                out.push_str(&format!("\t{} = {}\n", var.name, text));
            }
        }
    }
    out
}

fn append(out: &mut String, piece: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(piece);
}

fn format_value(value: &FieldValue, verbosity: Verbosity) -> String {
    match value {
        // 8-bit values are widened before printing so they come out as
        // numbers, not character codes
        FieldValue::U8(v) => (*v as u32).to_string(),
        FieldValue::S8(v) => (*v as i32).to_string(),
        FieldValue::U16(v) => v.to_string(),
        FieldValue::U32(v) => v.to_string(),
        FieldValue::U64(v) => v.to_string(),
        FieldValue::S16(v) => v.to_string(),
        FieldValue::S32(v) => v.to_string(),
        FieldValue::S64(v) => v.to_string(),
        FieldValue::F32(v) => v.to_string(),
        FieldValue::F64(v) => v.to_string(),
        FieldValue::Vector3([x, y, z]) => format!("<{}, {}, {}>", x, y, z),
        FieldValue::Vector3d([x, y, z]) => format!("<{}, {}, {}>", x, y, z),
        FieldValue::Vector4([x, y, z, w]) => format!("<{}, {}, {}, {}>", x, y, z, w),
        FieldValue::Quaternion([x, y, z, w]) => format!("<{}, {}, {}, {}>", x, y, z, w),
        FieldValue::Uuid(u) => u.to_string(),
        FieldValue::Bool(b) => b.to_string(),
        FieldValue::IpAddr(a) => a.to_string(),
        FieldValue::IpPort(p) => p.to_string(),
        FieldValue::Variable(data) | FieldValue::Fixed(data) => format_blob(data, verbosity),
    }
}

/// Dual-mode blob renderer: best-effort text, forced hex otherwise.
///
/// Summary mode inspects at most [`TEXT_PREVIEW`] bytes and tolerates a few
/// odd bytes in an otherwise textual field; full mode inspects everything
/// and gives up on the first byte that is not printable ASCII. A null byte
/// is tolerated only as the last byte of the window (C-string terminator).
fn format_blob(data: &[u8], verbosity: Verbosity) -> String {
    let window = match verbosity {
        Verbosity::Summary => data.len().min(TEXT_PREVIEW),
        Verbosity::Full => data.len(),
    };

    let mut readable = 0usize;
    let mut unreadable = 0usize;
    for (i, &byte) in data[..window].iter().enumerate() {
        if (0x20..=0x7E).contains(&byte) {
            readable += 1;
        } else if byte == 0 && i == window.saturating_sub(1) {
            // trailing terminator, neither readable nor unreadable
        } else if byte == 0 || verbosity == Verbosity::Full {
            unreadable = usize::MAX;
            break;
        } else {
            unreadable += 1;
        }
    }

    if readable >= unreadable {
        if verbosity == Verbosity::Summary && data.len() > TEXT_PREVIEW {
            // truncation marker baked into the displayed bytes: bytes 60-62
            // become "..." and display cuts at index 63
            let mut shown = data[..TEXT_PREVIEW - 1].to_vec();
            shown[TEXT_PREVIEW - 4..TEXT_PREVIEW - 1].copy_from_slice(b"...");
            String::from_utf8_lossy(&shown).into_owned()
        } else {
            String::from_utf8_lossy(&data[..window]).into_owned()
        }
    } else {
        match verbosity {
            Verbosity::Summary => {
                let shown = data.len().min(HEX_PREVIEW);
                let mut out = hex_dump(&data[..shown]);
                if data.len() > HEX_PREVIEW {
                    out.push_str("...");
                }
                out
            }
            Verbosity::Full => hex_dump(data),
        }
    }
}
