mod packet;

pub use packet::{
    Host, MessageKind, RawEntry, ACK_FLAG, MAX_PACKET_SIZE, MIN_VALID_PACKET_SIZE, RELIABLE_FLAG,
    RESENT_FLAG, ZERO_CODE_FLAG,
};
