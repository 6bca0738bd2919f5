//! Mesh Commissioning Protocol (§4.8, §4.9): the TLV codec shared by
//! both roles, the operational dataset, the Steering Data bloom filter,
//! the Commissioner state machine and joiner table, and the
//! Joiner-Router relay.

pub mod commissioner;
pub mod dataset;
pub mod joiner_router;
pub mod steering;
pub mod tlv;
