//! Builds both identifier forms on top of the `uuid` crate.

use super::NodeId;
pub use uuid::Uuid;

/// Length of the canonical hyphenated rendering.
pub const UUID_STR_LEN: usize = uuid::fmt::Hyphenated::LENGTH;

/// Only the low 14 bits of a clock sequence fit beside the variant bits.
pub const CLOCK_SEQ_MASK: u16 = 0x3FFF;

/// Builds a version 1 UUID from a 60-bit tick count, a clock sequence and a
/// node id.
pub fn time_uuid(ticks: u64, clock_seq: u16, node: NodeId) -> Uuid {
    uuid::Builder::from_gregorian_timestamp(ticks, clock_seq & CLOCK_SEQ_MASK, node.as_bytes())
        .into_uuid()
}

/// Builds a version 4 UUID from 16 random bytes. The version and variant
/// bits overwrite whatever the source put there.
pub fn random_uuid(bytes: [u8; 16]) -> Uuid {
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Returns the tick count and clock sequence embedded in a time-based id.
pub fn time_fields(id: &Uuid) -> Option<(u64, u16)> {
    (id.get_version_num() == 1)
        .then(|| id.get_timestamp())
        .flatten()
        .map(|ts| ts.to_gregorian())
}

/// Returns the node embedded in a time-based id.
pub fn node_of(id: &Uuid) -> Option<NodeId> {
    (id.get_version_num() == 1)
        .then(|| id.get_node_id())
        .flatten()
        .map(NodeId::new)
}
