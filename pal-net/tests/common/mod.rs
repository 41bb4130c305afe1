#![allow(dead_code)]

use std::net::UdpSocket;

/// Asks the kernel for a free loopback port.
pub fn free_port() -> u16 {
  UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

/// A plain std socket used as the remote peer.
pub fn peer() -> (UdpSocket, u16) {
  let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
  let port = sock.local_addr().unwrap().port();
  (sock, port)
}
