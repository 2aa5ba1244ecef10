//! Component A (CRC) and component C (compressed data stream) from
//! spec.md §4.A/§4.C.

pub mod crc;
pub mod zlib;
