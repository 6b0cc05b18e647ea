//! Statistics distribution protocol (spec §4.6/§4.7): the df-change
//! message codec, a dated on-disk log of committed chunks, the in-memory
//! document-frequency cache, and the peer-shard transaction that
//! reconciles incoming df changes against what this shard already knows.

pub mod cache;
pub mod dated_file_list;
pub mod message;
pub mod peer_transaction;
