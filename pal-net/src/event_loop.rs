//! Single-threaded readiness loop over `poll(2)`.
//!
//! Sockets register handlers through the [`Udp`] trait; [`EventLoop::tick`]
//! waits for readiness, then runs handlers with no internal borrow held, so a
//! handler may send, detach itself, or drop its own socket.

use std::{
  cell::{Cell, RefCell},
  collections::HashMap,
  io, mem,
  os::fd::RawFd,
  rc::{Rc, Weak},
  time::{Duration, Instant},
};

use tracing::{debug, trace, warn};

use crate::{
  Domain, NetError,
  net_utils::resolve,
  sys::{self, RawUdp},
  udp::{ErrHandler, RecvHandler, Udp, UdpDriver},
};

/// Sizing knobs for an [`EventLoop`].
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
  /// Largest datagram delivered to a receive handler; longer ones are
  /// truncated by the kernel.
  pub recv_buf_size: usize,
  /// Datagrams drained from one socket per readiness event.
  pub max_datagrams_per_turn: usize,
}

impl Default for LoopConfig {
  fn default() -> Self {
    Self { recv_buf_size: 64 * 1024, max_datagrams_per_turn: 32 }
  }
}

struct Entry {
  fd: RawFd,
  recv: Option<RecvHandler>,
  err: Option<ErrHandler>,
}

struct Inner {
  config: LoopConfig,
  entries: RefCell<HashMap<u64, Entry>>,
  next_token: Cell<u64>,
  buf: RefCell<Vec<u8>>,
}

impl Inner {
  fn recv_target(&self, token: u64) -> Option<(RawFd, RecvHandler)> {
    let entries = self.entries.borrow();
    let entry = entries.get(&token)?;
    Some((entry.fd, entry.recv.clone()?))
  }

  fn err_handler(&self, token: u64) -> Option<ErrHandler> {
    self.entries.borrow().get(&token)?.err.clone()
  }

  fn fd(&self, token: u64) -> Option<RawFd> {
    self.entries.borrow().get(&token).map(|entry| entry.fd)
  }
}

/// The datagram driver. Cloning is cheap; clones share one loop.
#[derive(Clone)]
pub struct EventLoop {
  inner: Rc<Inner>,
}

impl Default for EventLoop {
  fn default() -> Self {
    Self::new()
  }
}

impl EventLoop {
  pub fn new() -> Self {
    Self::with_config(LoopConfig::default())
  }

  pub fn with_config(config: LoopConfig) -> Self {
    assert!(config.recv_buf_size > 0, "receive buffer must not be empty");
    assert!(
      config.max_datagrams_per_turn > 0,
      "drain budget must be positive"
    );
    Self {
      inner: Rc::new(Inner {
        config,
        entries: RefCell::new(HashMap::new()),
        next_token: Cell::new(1),
        buf: RefCell::new(vec![0; config.recv_buf_size]),
      }),
    }
  }

  /// Number of live sockets owned by this loop.
  pub fn len(&self) -> usize {
    self.inner.entries.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Waits up to `timeout` (forever when `None`) for readiness on sockets
  /// with a registered handler, then dispatches. Returns the number of
  /// handler invocations.
  pub fn tick(&self, timeout: Option<Duration>) -> io::Result<usize> {
    let (mut pollfds, tokens) = self.interest();
    if pollfds.is_empty() && timeout.is_none() {
      // Nothing could ever wake us.
      return Ok(0);
    }

    let timeout_ms = match timeout {
      Some(timeout) => {
        timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int
      }
      None => -1,
    };

    match syscall!(poll(
      pollfds.as_mut_ptr(),
      pollfds.len() as libc::nfds_t,
      timeout_ms,
    )) {
      Ok(0) => return Ok(0),
      Ok(_) => {}
      Err(err) if err.kind() == io::ErrorKind::Interrupted => return Ok(0),
      Err(err) => return Err(err),
    }

    let mut dispatched = 0;
    for (pollfd, token) in pollfds.iter().zip(tokens) {
      let revents = pollfd.revents;
      if revents == 0 {
        continue;
      }
      if revents & libc::POLLNVAL != 0 {
        warn!(token, "poll reported an invalid descriptor");
        continue;
      }
      if revents & libc::POLLERR != 0 {
        dispatched += self.deliver_pending_error(token);
      }
      if revents & libc::POLLIN != 0 {
        dispatched += self.drain(token);
      }
    }
    Ok(dispatched)
  }

  /// Ticks until `done` returns true or `timeout` elapses. Returns whether
  /// `done` was satisfied.
  pub fn run_until(
    &self,
    mut done: impl FnMut() -> bool,
    timeout: Duration,
  ) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    while !done() {
      let now = Instant::now();
      if now >= deadline {
        return Ok(false);
      }
      self.tick(Some(deadline - now))?;
    }
    Ok(true)
  }

  fn interest(&self) -> (Vec<libc::pollfd>, Vec<u64>) {
    let entries = self.inner.entries.borrow();
    let mut pollfds = Vec::with_capacity(entries.len());
    let mut tokens = Vec::with_capacity(entries.len());

    for (token, entry) in entries.iter() {
      if entry.recv.is_none() && entry.err.is_none() {
        continue;
      }
      // POLLERR is always reported; only ask for input when someone reads.
      let events = if entry.recv.is_some() { libc::POLLIN } else { 0 };
      pollfds.push(libc::pollfd { fd: entry.fd, events, revents: 0 });
      tokens.push(*token);
    }
    (pollfds, tokens)
  }

  fn drain(&self, token: u64) -> usize {
    let mut buf = mem::take(&mut *self.inner.buf.borrow_mut());
    if buf.is_empty() {
      buf = vec![0; self.inner.config.recv_buf_size];
    }

    let mut dispatched = 0;
    for _ in 0..self.inner.config.max_datagrams_per_turn {
      // Re-checked per datagram: a handler may detach itself or close.
      let Some((fd, handler)) = self.inner.recv_target(token) else {
        break;
      };
      match sys::recv_from(fd, &mut buf) {
        Ok((len, from)) => {
          trace!(token, len, %from, "datagram received");
          handler(&buf[..len], &from.ip().to_string(), from.port());
          dispatched += 1;
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) => {
          dispatched += self.deliver(token, NetError::from(err));
          break;
        }
      }
    }

    *self.inner.buf.borrow_mut() = buf;
    dispatched
  }

  fn deliver_pending_error(&self, token: u64) -> usize {
    let Some(fd) = self.inner.fd(token) else {
      return 0;
    };
    match sys::take_error(fd) {
      Ok(Some(err)) => self.deliver(token, NetError::from(err)),
      Ok(None) => 0,
      Err(err) => {
        warn!(token, %err, "could not read socket error");
        0
      }
    }
  }

  fn deliver(&self, token: u64, err: NetError) -> usize {
    debug!(token, %err, "socket error");
    match self.inner.err_handler(token) {
      Some(handler) => {
        handler(err);
        1
      }
      None => 0,
    }
  }
}

impl UdpDriver for EventLoop {
  fn new_udp(&self, domain: Domain) -> Option<Box<dyn Udp>> {
    let raw = match RawUdp::new(domain) {
      Ok(raw) => raw,
      Err(err) => {
        debug!(domain = domain.name(), %err, "udp socket allocation failed");
        return None;
      }
    };

    let token = self.inner.next_token.get();
    self.inner.next_token.set(token + 1);
    self
      .inner
      .entries
      .borrow_mut()
      .insert(token, Entry { fd: raw.fd(), recv: None, err: None });

    Some(Box::new(LoopUdp {
      token,
      domain,
      raw,
      inner: Rc::downgrade(&self.inner),
    }))
  }
}

struct LoopUdp {
  token: u64,
  domain: Domain,
  raw: RawUdp,
  inner: Weak<Inner>,
}

impl LoopUdp {
  fn update(&self, f: impl FnOnce(&mut Entry)) {
    if let Some(inner) = self.inner.upgrade()
      && let Some(entry) = inner.entries.borrow_mut().get_mut(&self.token)
    {
      f(entry);
    }
  }
}

fn sent(result: io::Result<usize>, expected: usize) -> Result<(), NetError> {
  match result {
    Ok(n) if n == expected => Ok(()),
    Ok(_) => Err(NetError::Os(libc::EMSGSIZE)),
    Err(err) => Err(err.into()),
  }
}

impl Udp for LoopUdp {
  fn token(&self) -> u64 {
    self.token
  }

  fn enable_broadcast(&self) -> Result<(), NetError> {
    Ok(self.raw.set_broadcast()?)
  }

  fn bind(&self, addr: &str, port: u16) -> Result<(), NetError> {
    Ok(self.raw.bind(resolve(self.domain, addr, port)?)?)
  }

  fn connect(&self, addr: &str, port: u16) -> Result<(), NetError> {
    Ok(self.raw.connect(resolve(self.domain, addr, port)?)?)
  }

  fn send(&self, data: &[u8]) -> Result<(), NetError> {
    sent(self.raw.send(data), data.len())
  }

  fn sendto(&self, data: &[u8], addr: &str, port: u16) -> Result<(), NetError> {
    let to = resolve(self.domain, addr, port)?;
    sent(self.raw.send_to(data, to), data.len())
  }

  fn set_recv_handler(&self, handler: Option<RecvHandler>) {
    self.update(|entry| entry.recv = handler);
  }

  fn set_err_handler(&self, handler: Option<ErrHandler>) {
    self.update(|entry| entry.err = handler);
  }
}

impl Drop for LoopUdp {
  fn drop(&mut self) {
    // Unregister before `raw` closes the descriptor.
    if let Some(inner) = self.inner.upgrade() {
      inner.entries.borrow_mut().remove(&self.token);
    }
  }
}
