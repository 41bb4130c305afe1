//! The bridge from native events into Lua.
//!
//! The driver calls the closures built here from its own loop turn. Every
//! call into Lua is protected: a failing callback is logged and dropped,
//! and the driver sees a normal return.

use std::{cell::Cell, rc::Rc};

use mlua::{Function, Lua, Value, WeakLua};
use pal_net::{ErrHandler, NetError, RecvHandler};
use tracing::{error, warn};

use crate::{
  Config,
  handle::HandleId,
  slots::{Presence, Role, SlotStore},
};

/// What the driver carries back to us with every event: the handle's
/// identity and the state it shares with its userdata.
#[derive(Clone)]
pub(crate) struct Context {
  id: HandleId,
  lua: WeakLua,
  presence: Rc<Cell<Presence>>,
  last_error: Rc<Cell<Option<NetError>>>,
  config: Rc<Config>,
}

impl Context {
  pub(crate) fn new(lua: &Lua, id: HandleId, config: Rc<Config>) -> Self {
    Self {
      id,
      lua: lua.weak(),
      presence: Rc::new(Cell::new(Presence::EMPTY)),
      last_error: Rc::new(Cell::new(None)),
      config,
    }
  }

  pub(crate) fn id(&self) -> HandleId {
    self.id
  }

  pub(crate) fn lua(&self) -> Option<Lua> {
    self.lua.try_upgrade()
  }

  pub(crate) fn presence(&self) -> Presence {
    self.presence.get()
  }

  pub(crate) fn update_presence(&self, f: impl FnOnce(Presence) -> Presence) {
    self.presence.set(f(self.presence.get()));
  }

  pub(crate) fn last_error(&self) -> Option<NetError> {
    self.last_error.get()
  }

  fn on_recv(&self, payload: &[u8], addr: &str, port: u16) {
    let presence = self.presence();
    debug_assert!(
      presence.has(Role::RecvCallback),
      "receive event without a registered callback"
    );
    let Some(lua) = self.lua() else {
      return;
    };

    let result = self.call_recv(&lua, presence, payload, addr, port);
    self.finish(&lua, "recv", result);
  }

  fn call_recv(
    &self,
    lua: &Lua,
    presence: Presence,
    payload: &[u8],
    addr: &str,
    port: u16,
  ) -> mlua::Result<()> {
    let callback: Function = SlotStore::get(lua, self.id, Role::RecvCallback)?;
    let payload = lua.create_string(payload)?;
    if presence.has(Role::RecvArg) {
      let arg: Value = SlotStore::get(lua, self.id, Role::RecvArg)?;
      callback.call((payload, addr, port, arg))
    } else {
      callback.call((payload, addr, port))
    }
  }

  fn on_error(&self, err: NetError) {
    // Recorded first so the callback can read it through `lastError`.
    self.last_error.set(Some(err));

    let presence = self.presence();
    debug_assert!(
      presence.has(Role::ErrCallback),
      "error event without a registered callback"
    );
    let Some(lua) = self.lua() else {
      return;
    };

    let result = self.call_err(&lua, presence);
    self.finish(&lua, "err", result);
  }

  fn call_err(&self, lua: &Lua, presence: Presence) -> mlua::Result<()> {
    let callback: Function = SlotStore::get(lua, self.id, Role::ErrCallback)?;
    if presence.has(Role::ErrArg) {
      let arg: Value = SlotStore::get(lua, self.id, Role::ErrArg)?;
      callback.call(arg)
    } else {
      callback.call(())
    }
  }

  fn finish(&self, lua: &Lua, event: &'static str, result: mlua::Result<()>) {
    if let Err(err) = result {
      error!(handle = self.id.get(), event, "callback failed: {err}");
    }
    if let Some(kbytes) = self.config.step_kbytes()
      && let Err(err) = lua.gc_step_kbytes(kbytes)
    {
      warn!(handle = self.id.get(), %err, "collector step failed");
    }
  }
}

/// The receive entry point registered with the driver.
pub(crate) fn recv_entry(ctx: Context) -> RecvHandler {
  Rc::new(move |payload: &[u8], addr: &str, port: u16| {
    ctx.on_recv(payload, addr, port)
  })
}

/// The error entry point registered with the driver.
pub(crate) fn err_entry(ctx: Context) -> ErrHandler {
  Rc::new(move |err: NetError| ctx.on_error(err))
}
