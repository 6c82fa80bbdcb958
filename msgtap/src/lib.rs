pub mod filter;
pub mod message_log;
pub mod pretty;
pub mod tamper;
pub mod template;

pub use filter::{FilterProgress, FilterTask, NameFilter, FILTER_CHUNK};
pub use message_log::{LogCallback, MessageLog};
pub use pretty::{
    decode_name, Direction, PrettyMessage, HEX_PREVIEW, NAME_INVALID, NAME_UNSUPPORTED,
    SUMMARY_BUDGET, TEXT_PREVIEW,
};
pub use tamper::{MessageTamperer, TamperCallback, TamperRule};
pub use template::{
    FieldValue, MessageTemplate, NullCodec, ScratchBuffer, TemplateBlock, TemplateCodec,
    TemplateVariable, WireType,
};

// Re-export the shared packet types so downstream users need only this crate
pub use msgtap_common::{
    Host, MessageKind, RawEntry, ACK_FLAG, MAX_PACKET_SIZE, MIN_VALID_PACKET_SIZE, RELIABLE_FLAG,
    RESENT_FLAG, ZERO_CODE_FLAG,
};
