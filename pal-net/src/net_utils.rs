use std::{
  io, mem,
  net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
};

use crate::{Domain, NetError};

/// Parses a textual address and checks it against the socket's domain.
pub(crate) fn resolve(
  domain: Domain,
  addr: &str,
  port: u16,
) -> Result<SocketAddr, NetError> {
  let ip: IpAddr = addr.parse().map_err(|_| NetError::InvalidArg)?;
  if !domain.accepts(&ip) {
    return Err(NetError::AddrFamily);
  }
  Ok(SocketAddr::new(ip, port))
}

/// Lays a [`SocketAddr`] out as the `sockaddr` the kernel expects.
pub(crate) fn socketaddr_into_libc(
  addr: SocketAddr,
) -> (libc::sockaddr_storage, libc::socklen_t) {
  // SAFETY: sockaddr_storage is plain old data; all-zero is a valid value.
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };

  let len = match addr {
    SocketAddr::V4(v4) => {
      // SAFETY: sockaddr_storage is large and aligned enough for any
      // sockaddr_* type, and we only write through this one view.
      let sin = unsafe {
        &mut *(&mut storage as *mut libc::sockaddr_storage)
          .cast::<libc::sockaddr_in>()
      };
      sin.sin_family = libc::AF_INET as libc::sa_family_t;
      sin.sin_port = v4.port().to_be();
      sin.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
      mem::size_of::<libc::sockaddr_in>()
    }
    SocketAddr::V6(v6) => {
      // SAFETY: same as above.
      let sin6 = unsafe {
        &mut *(&mut storage as *mut libc::sockaddr_storage)
          .cast::<libc::sockaddr_in6>()
      };
      sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
      sin6.sin6_port = v6.port().to_be();
      sin6.sin6_flowinfo = v6.flowinfo();
      sin6.sin6_addr.s6_addr = v6.ip().octets();
      sin6.sin6_scope_id = v6.scope_id();
      mem::size_of::<libc::sockaddr_in6>()
    }
  };

  (storage, len as libc::socklen_t)
}

/// Reads back an address filled in by `recvfrom(2)`.
pub(crate) fn libc_into_socketaddr(
  storage: &libc::sockaddr_storage,
) -> io::Result<SocketAddr> {
  let ptr = storage as *const libc::sockaddr_storage;

  match storage.ss_family as libc::c_int {
    libc::AF_INET => {
      // SAFETY: ss_family says this storage holds a sockaddr_in.
      let sin = unsafe { *ptr.cast::<libc::sockaddr_in>() };
      let ip = Ipv4Addr::from(sin.sin_addr.s_addr.to_ne_bytes());
      Ok(SocketAddr::V4(SocketAddrV4::new(ip, u16::from_be(sin.sin_port))))
    }
    libc::AF_INET6 => {
      // SAFETY: ss_family says this storage holds a sockaddr_in6.
      let sin6 = unsafe { *ptr.cast::<libc::sockaddr_in6>() };
      Ok(SocketAddr::V6(SocketAddrV6::new(
        Ipv6Addr::from(sin6.sin6_addr.s6_addr),
        u16::from_be(sin6.sin6_port),
        sin6.sin6_flowinfo,
        sin6.sin6_scope_id,
      )))
    }
    _ => Err(io::Error::from_raw_os_error(libc::EAFNOSUPPORT)),
  }
}
