//! Handle lifecycle.
//!
//! A handle is Open while it owns a native socket and Closed afterwards.
//! Three paths lead to teardown (explicit `close`, the `__close` metamethod,
//! and collection of the userdata); all of them funnel into
//! [`UdpHandle::release`], which does nothing on a Closed handle. Only the
//! explicit `close` treats a Closed handle as an error.

use std::{
  fmt,
  rc::Rc,
  sync::atomic::{AtomicU64, Ordering},
};

use mlua::Lua;
use pal_net::{NetError, Udp};
use tracing::{debug, warn};

use crate::{
  Config, Error,
  dispatch::Context,
  slots::{Presence, SlotStore},
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable surrogate identity of a handle, assigned once at creation.
///
/// Slot store keys are derived from this, never from an address, so the
/// collector is free to move or reuse the userdata's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
  fn next() -> Self {
    Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
  }

  #[cfg(test)]
  pub(crate) fn from_raw(raw: u64) -> Self {
    Self(raw)
  }

  pub fn get(self) -> u64 {
    self.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
  Open,
  Closed,
}

/// The userdata behind a script-visible UDP handle.
pub struct UdpHandle {
  socket: Option<Box<dyn Udp>>,
  ctx: Context,
}

impl UdpHandle {
  pub(crate) fn new(
    lua: &Lua,
    socket: Box<dyn Udp>,
    config: Rc<Config>,
  ) -> Self {
    let ctx = Context::new(lua, HandleId::next(), config);
    Self { socket: Some(socket), ctx }
  }

  pub fn id(&self) -> HandleId {
    self.ctx.id()
  }

  pub fn state(&self) -> State {
    match self.socket {
      Some(_) => State::Open,
      None => State::Closed,
    }
  }

  pub fn presence(&self) -> Presence {
    self.ctx.presence()
  }

  /// Most recent error the driver reported for this handle.
  pub fn last_error(&self) -> Option<NetError> {
    self.ctx.last_error()
  }

  pub(crate) fn context(&self) -> Context {
    self.ctx.clone()
  }

  /// The native socket, or [`Error::Closed`].
  pub(crate) fn socket(&self) -> Result<&dyn Udp, Error> {
    self.socket.as_deref().ok_or(Error::Closed)
  }

  /// Explicit close. Closing twice is a programmer error.
  pub(crate) fn close(&mut self, lua: &Lua) -> mlua::Result<()> {
    if self.state() == State::Closed {
      return Err(Error::Closed.into());
    }
    self.release(Some(lua))
  }

  /// Scope exit or collection. Never fails.
  pub(crate) fn release_quietly(&mut self, lua: Option<&Lua>) {
    if let Err(err) = self.release(lua) {
      warn!(handle = self.id().get(), %err, "udp handle teardown incomplete");
    }
  }

  /// Frees the socket (which detaches both native handlers) and nils the
  /// four slots. No-op when already Closed. Without a live Lua state only
  /// the socket is freed.
  fn release(&mut self, lua: Option<&Lua>) -> mlua::Result<()> {
    let Some(socket) = self.socket.take() else {
      return Ok(());
    };
    drop(socket);
    self.ctx.update_presence(|_| Presence::EMPTY);
    debug!(handle = self.id().get(), "udp handle released");

    match lua {
      Some(lua) => SlotStore::clear(lua, self.id()),
      None => Ok(()),
    }
  }
}

impl fmt::Display for UdpHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.socket {
      Some(socket) => write!(f, "UDP handle ({:#x})", socket.token()),
      None => f.write_str("closed"),
    }
  }
}

impl fmt::Debug for UdpHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("UdpHandle")
      .field("id", &self.id())
      .field("state", &self.state())
      .field("presence", &self.presence())
      .finish()
  }
}

impl Drop for UdpHandle {
  fn drop(&mut self) {
    let lua = self.ctx.lua();
    self.release_quietly(lua.as_ref());
  }
}
