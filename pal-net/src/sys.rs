//! Thin wrappers over the BSD socket calls used by the event loop.

use std::{
  io, mem,
  net::SocketAddr,
  os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
};

use crate::{
  Domain,
  net_utils::{libc_into_socketaddr, socketaddr_into_libc},
};

#[cfg(target_os = "linux")]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(target_os = "linux"))]
const SEND_FLAGS: libc::c_int = 0;

/// Non-blocking UDP socket. Closed on drop.
pub(crate) struct RawUdp {
  fd: OwnedFd,
}

impl RawUdp {
  #[cfg(target_os = "linux")]
  pub(crate) fn new(domain: Domain) -> io::Result<Self> {
    let ty = libc::SOCK_DGRAM | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC;
    let fd = syscall!(socket(domain.as_raw(), ty, libc::IPPROTO_UDP))?;
    // SAFETY: We literally just created it.
    Ok(Self { fd: unsafe { OwnedFd::from_raw_fd(fd) } })
  }

  #[cfg(not(target_os = "linux"))]
  pub(crate) fn new(domain: Domain) -> io::Result<Self> {
    let fd =
      syscall!(socket(domain.as_raw(), libc::SOCK_DGRAM, libc::IPPROTO_UDP))?;
    // SAFETY: We literally just created it.
    let fd = unsafe { OwnedFd::from_raw_fd(fd) };

    let mut nonblocking = true as libc::c_int;
    syscall!(ioctl(fd.as_raw_fd(), libc::FIONBIO, &mut nonblocking))?;
    syscall!(fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC))?;
    Ok(Self { fd })
  }

  pub(crate) fn fd(&self) -> RawFd {
    self.fd.as_raw_fd()
  }

  pub(crate) fn set_broadcast(&self) -> io::Result<()> {
    let on: libc::c_int = 1;
    syscall!(setsockopt(
      self.fd(),
      libc::SOL_SOCKET,
      libc::SO_BROADCAST,
      &on as *const libc::c_int as *const libc::c_void,
      mem::size_of::<libc::c_int>() as libc::socklen_t,
    ))
    .map(drop)
  }

  pub(crate) fn bind(&self, addr: SocketAddr) -> io::Result<()> {
    let (storage, len) = socketaddr_into_libc(addr);
    syscall!(bind(
      self.fd(),
      &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
      len,
    ))
    .map(drop)
  }

  pub(crate) fn connect(&self, addr: SocketAddr) -> io::Result<()> {
    let (storage, len) = socketaddr_into_libc(addr);
    syscall!(connect(
      self.fd(),
      &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
      len,
    ))
    .map(drop)
  }

  pub(crate) fn send(&self, data: &[u8]) -> io::Result<usize> {
    syscall!(send(
      self.fd(),
      data.as_ptr() as *const libc::c_void,
      data.len(),
      SEND_FLAGS,
    ))
    .map(|n| n as usize)
  }

  pub(crate) fn send_to(
    &self,
    data: &[u8],
    addr: SocketAddr,
  ) -> io::Result<usize> {
    let (storage, len) = socketaddr_into_libc(addr);
    syscall!(sendto(
      self.fd(),
      data.as_ptr() as *const libc::c_void,
      data.len(),
      SEND_FLAGS,
      &storage as *const libc::sockaddr_storage as *const libc::sockaddr,
      len,
    ))
    .map(|n| n as usize)
  }
}

/// `recvfrom(2)` on a descriptor the caller keeps open for the duration.
pub(crate) fn recv_from(
  fd: RawFd,
  buf: &mut [u8],
) -> io::Result<(usize, SocketAddr)> {
  // SAFETY: all-zero sockaddr_storage is valid.
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
  let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
  let n = syscall!(recvfrom(
    fd,
    buf.as_mut_ptr() as *mut libc::c_void,
    buf.len(),
    0,
    &mut storage as *mut libc::sockaddr_storage as *mut libc::sockaddr,
    &mut len,
  ))?;
  Ok((n as usize, libc_into_socketaddr(&storage)?))
}

/// Pending asynchronous error (`SO_ERROR`), cleared by reading it.
pub(crate) fn take_error(fd: RawFd) -> io::Result<Option<io::Error>> {
  let mut code: libc::c_int = 0;
  let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
  syscall!(getsockopt(
    fd,
    libc::SOL_SOCKET,
    libc::SO_ERROR,
    &mut code as *mut libc::c_int as *mut libc::c_void,
    &mut len,
  ))?;
  Ok((code != 0).then(|| io::Error::from_raw_os_error(code)))
}
