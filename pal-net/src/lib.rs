//! # pal-net - Platform Network Layer
//!
//! The native side of script-visible datagram sockets: the driver contract
//! ([`UdpDriver`], [`Udp`]), the enumerated set of supported address
//! families ([`Domain`]), native result codes ([`NetError`]), and a
//! single-threaded driver over `poll(2)` ([`EventLoop`]).
//!
//! ## Event delivery
//!
//! Handlers run synchronously from [`EventLoop::tick`], on the caller's
//! thread, once per event. No borrow of loop state is held while a handler
//! runs.
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::time::Duration;
//! use pal_net::{Domain, EventLoop, UdpDriver};
//!
//! let event_loop = EventLoop::new();
//! let sock = event_loop.new_udp(Domain::Inet).expect("socket");
//! sock.bind("127.0.0.1", 5353).expect("bind");
//! sock.set_recv_handler(Some(Rc::new(|payload, addr, port| {
//!   println!("{} bytes from {addr}:{port}", payload.len());
//! })));
//!
//! event_loop.tick(Some(Duration::from_millis(100))).unwrap();
//! ```
//!
//! *Note:* only unix targets are supported.

#[macro_use]
mod macros;

mod domain;
mod error;
mod event_loop;
mod net_utils;
mod sys;
mod udp;

pub use domain::Domain;
pub use error::NetError;
pub use event_loop::{EventLoop, LoopConfig};
pub use udp::{ErrHandler, RecvHandler, Udp, UdpDriver};
