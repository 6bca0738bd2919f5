//! Mesh Link Establishment (§4.10): the router table and Route64 TLV
//! fill/consume logic layered on top of it.

pub mod route_tlv;
pub mod router_table;
