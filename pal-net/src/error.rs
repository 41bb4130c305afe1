use std::io;

use thiserror::Error;

/// Result code of a native datagram operation.
///
/// These are operational failures: callers are expected to branch on them,
/// so the type is `Copy` and cheap to hand to error handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NetError {
  #[error("invalid argument")]
  InvalidArg,
  #[error("address family does not match the socket domain")]
  AddrFamily,
  #[error("operation would block")]
  WouldBlock,
  #[error("socket is not connected")]
  NotConnected,
  #[error("connection refused")]
  ConnRefused,
  #[error("{}", os_message(.0))]
  Os(i32),
}

fn os_message(code: &i32) -> io::Error {
  io::Error::from_raw_os_error(*code)
}

impl From<io::Error> for NetError {
  fn from(err: io::Error) -> Self {
    if err.kind() == io::ErrorKind::WouldBlock {
      return NetError::WouldBlock;
    }
    match err.raw_os_error() {
      Some(libc::EINVAL) => NetError::InvalidArg,
      Some(libc::EAFNOSUPPORT) => NetError::AddrFamily,
      Some(libc::ENOTCONN) | Some(libc::EDESTADDRREQ) => NetError::NotConnected,
      Some(libc::ECONNREFUSED) => NetError::ConnRefused,
      Some(code) => NetError::Os(code),
      None => NetError::InvalidArg,
    }
  }
}
