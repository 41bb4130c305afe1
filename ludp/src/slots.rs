//! Callback slots.
//!
//! Each handle owns four slots in a table kept in the Lua registry, keyed by
//! the handle's surrogate id and the slot's [`Role`]. The handle mirrors
//! which slots are non-nil in a [`Presence`] set that the dispatch bridge
//! reads without touching Lua.

use mlua::{FromLua, Function, IntoLua, Lua, Table, Value};

use crate::{dispatch, handle::HandleId, handle::UdpHandle};

const REGISTRY_KEY: &str = "ludp.slots";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
  RecvCallback = 0,
  RecvArg = 1,
  ErrCallback = 2,
  ErrArg = 3,
}

impl Role {
  pub const ALL: [Role; 4] =
    [Role::RecvCallback, Role::RecvArg, Role::ErrCallback, Role::ErrArg];

  fn key(self, id: HandleId) -> i64 {
    id.get() as i64 * 4 + self as i64
  }
}

/// Which of a handle's four slots currently hold a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presence([bool; 4]);

impl Presence {
  pub const EMPTY: Presence = Presence([false; 4]);

  pub fn has(self, role: Role) -> bool {
    self.0[role as usize]
  }

  pub(crate) fn with(mut self, role: Role, present: bool) -> Self {
    self.0[role as usize] = present;
    self
  }
}

/// The registry-backed slot table.
pub(crate) struct SlotStore;

impl SlotStore {
  pub(crate) fn install(lua: &Lua) -> mlua::Result<()> {
    if lua.named_registry_value::<Option<Table>>(REGISTRY_KEY)?.is_none() {
      lua.set_named_registry_value(REGISTRY_KEY, lua.create_table()?)?;
    }
    Ok(())
  }

  fn table(lua: &Lua) -> mlua::Result<Table> {
    lua.named_registry_value(REGISTRY_KEY)
  }

  pub(crate) fn get<V: FromLua>(
    lua: &Lua,
    id: HandleId,
    role: Role,
  ) -> mlua::Result<V> {
    Self::table(lua)?.raw_get(role.key(id))
  }

  pub(crate) fn set(
    lua: &Lua,
    id: HandleId,
    role: Role,
    value: impl IntoLua,
  ) -> mlua::Result<()> {
    Self::table(lua)?.raw_set(role.key(id), value)
  }

  /// Writes nil to all four slots of `id`.
  pub(crate) fn clear(lua: &Lua, id: HandleId) -> mlua::Result<()> {
    let table = Self::table(lua)?;
    for role in Role::ALL {
      table.raw_set(role.key(id), Value::Nil)?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
  Recv,
  Err,
}

impl Event {
  fn roles(self) -> (Role, Role) {
    match self {
      Event::Recv => (Role::RecvCallback, Role::RecvArg),
      Event::Err => (Role::ErrCallback, Role::ErrArg),
    }
  }
}

/// `setRecvCb` / `setErrCb`: last write wins on both slots, and native
/// registration follows callback presence.
pub(crate) fn set_callback(
  lua: &Lua,
  handle: &UdpHandle,
  event: Event,
  callback: Option<Function>,
  arg: Value,
) -> mlua::Result<()> {
  let socket = handle.socket()?;
  let ctx = handle.context();
  let (callback_role, arg_role) = event.roles();

  let has_callback = callback.is_some();
  SlotStore::set(lua, ctx.id(), callback_role, callback)?;
  let has_arg = !arg.is_nil();
  SlotStore::set(lua, ctx.id(), arg_role, arg)?;

  ctx.update_presence(|presence| {
    presence.with(callback_role, has_callback).with(arg_role, has_arg)
  });

  match event {
    Event::Recv => {
      socket.set_recv_handler(has_callback.then(|| dispatch::recv_entry(ctx)))
    }
    Event::Err => {
      socket.set_err_handler(has_callback.then(|| dispatch::err_entry(ctx)))
    }
  }
  Ok(())
}
