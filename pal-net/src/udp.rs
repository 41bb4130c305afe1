use std::rc::Rc;

use crate::{Domain, NetError};

/// Receive handler: `(payload, sender address, sender port)`.
///
/// Handlers are reference counted so a driver can clone one out of its
/// registry and release every internal borrow before invoking it.
pub type RecvHandler = Rc<dyn Fn(&[u8], &str, u16)>;

/// Error handler, invoked with the native error that was observed.
pub type ErrHandler = Rc<dyn Fn(NetError)>;

/// An open native datagram socket.
///
/// Dropping the box frees the socket and unregisters both handlers. After
/// `set_recv_handler(None)` (or `set_err_handler(None)`) returns, the driver
/// must not deliver that event for this socket again.
pub trait Udp {
  /// Identity token, stable for the socket's lifetime.
  fn token(&self) -> u64;

  fn enable_broadcast(&self) -> Result<(), NetError>;

  fn bind(&self, addr: &str, port: u16) -> Result<(), NetError>;

  fn connect(&self, addr: &str, port: u16) -> Result<(), NetError>;

  /// Sends to the connected peer.
  fn send(&self, data: &[u8]) -> Result<(), NetError>;

  fn sendto(&self, data: &[u8], addr: &str, port: u16) -> Result<(), NetError>;

  fn set_recv_handler(&self, handler: Option<RecvHandler>);

  fn set_err_handler(&self, handler: Option<ErrHandler>);
}

/// Allocates native datagram sockets.
pub trait UdpDriver {
  /// Returns `None` when the platform cannot allocate a socket in `domain`.
  fn new_udp(&self, domain: Domain) -> Option<Box<dyn Udp>>;
}
