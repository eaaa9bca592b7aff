//! `gbn-transfer`: reliable file delivery over UDP using Go-Back-N.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  chunks  ┌───────────┐  seq, payload  ┌──────────┐
//!  │ fragment │─────────▶│  session  │───────────────▶│  packet  │
//!  └──────────┘          └─┬───────┬─┘                └────┬─────┘
//!                          │       │                       │ checksum
//!                 ┌────────▼─┐   ┌─▼──────┐                ▼
//!                 │  window  │   │ timer  │         DatagramSink
//!                 └──────────┘   └────────┘       (socket / simulator)
//!
//!  server: one listener, demultiplexes acks to sessions by peer address
//! ```
//!
//! Each module has a single responsibility:
//! - [`checksum`]   : 16-bit integrity checksum
//! - [`packet`]     : wire format for data packets and acks
//! - [`fragment`]   : fixed-size chunking of a file
//! - [`config`]     : tunable parameters and their invariants
//! - [`window`]     : Go-Back-N send window (`base`, `next_seq`)
//! - [`timer`]      : retransmit deadline and bounded ack wait
//! - [`session`]    : one transfer to one peer
//! - [`catalog`]    : index of servable files
//! - [`command`]    : `INFO` / `DOWNLOAD` control commands
//! - [`server`]     : listening loop and session registry
//! - [`receiver`]   : receive-side validation and cumulative acks
//! - [`client`]     : reference downloader
//! - [`simulator`]  : fault-injecting link for tests
//! - [`socket`]     : async UDP socket abstraction

pub mod catalog;
pub mod checksum;
pub mod client;
pub mod command;
pub mod config;
pub mod fragment;
pub mod packet;
pub mod receiver;
pub mod server;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod timer;
pub mod window;
