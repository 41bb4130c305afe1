//! The script-visible surface: the module table and the handle methods.
//!
//! Argument conversion errors and use of a closed handle raise. Everything
//! the network can refuse comes back as `false` (or `nil` from `open`).

use std::rc::Rc;

use mlua::{
  AnyUserData, Function, Integer, Lua, MetaMethod, MultiValue, Table,
  UserData, UserDataMethods, Value,
};
use pal_net::{NetError, UdpDriver};
use tracing::{debug, trace};

use crate::{
  Config,
  handle::UdpHandle,
  slots::{self, Event, SlotStore},
};

pub(crate) fn module(
  lua: &Lua,
  driver: Rc<dyn UdpDriver>,
  config: Rc<Config>,
) -> mlua::Result<Table> {
  SlotStore::install(lua)?;

  let exports = lua.create_table()?;
  exports.set(
    "open",
    lua.create_function(move |lua, name: String| {
      open(lua, driver.as_ref(), &config, &name)
    })?,
  )?;
  Ok(exports)
}

fn open(
  lua: &Lua,
  driver: &dyn UdpDriver,
  config: &Rc<Config>,
  name: &str,
) -> mlua::Result<Option<AnyUserData>> {
  let Some(domain) = config.domain(name) else {
    trace!(name, "unknown network domain");
    return Ok(None);
  };
  let Some(socket) = driver.new_udp(domain) else {
    debug!(domain = domain.name(), "native socket allocation failed");
    return Ok(None);
  };

  let handle = UdpHandle::new(lua, socket, config.clone());
  debug!(
    handle = handle.id().get(),
    domain = domain.name(),
    "udp handle opened"
  );
  lua.create_userdata(handle).map(Some)
}

fn port(port: Integer) -> Option<u16> {
  u16::try_from(port).ok()
}

fn succeeded(op: &'static str, result: Result<(), NetError>) -> bool {
  match result {
    Ok(()) => true,
    Err(err) => {
      trace!(op, %err, "udp operation failed");
      false
    }
  }
}

impl UserData for UdpHandle {
  fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
    methods.add_method("enableBroadcast", |_, this, ()| {
      Ok(succeeded("enableBroadcast", this.socket()?.enable_broadcast()))
    });

    methods.add_method("bind", |_, this, (addr, raw): (String, Integer)| {
      let socket = this.socket()?;
      let Some(port) = port(raw) else {
        trace!(port = raw, "bind port out of range");
        return Ok(false);
      };
      Ok(succeeded("bind", socket.bind(&addr, port)))
    });

    methods.add_method("connect", |_, this, (addr, raw): (String, Integer)| {
      let socket = this.socket()?;
      let Some(port) = port(raw) else {
        trace!(port = raw, "connect port out of range");
        return Ok(false);
      };
      Ok(succeeded("connect", socket.connect(&addr, port)))
    });

    methods.add_method("send", |_, this, data: mlua::String| {
      let socket = this.socket()?;
      Ok(succeeded("send", socket.send(&data.as_bytes())))
    });

    methods.add_method(
      "sendto",
      |_, this, (data, addr, raw): (mlua::String, String, Integer)| {
        let socket = this.socket()?;
        let Some(port) = port(raw) else {
          trace!(port = raw, "sendto port out of range");
          return Ok(false);
        };
        Ok(succeeded("sendto", socket.sendto(&data.as_bytes(), &addr, port)))
      },
    );

    methods.add_method(
      "setRecvCb",
      |lua, this, (callback, arg): (Option<Function>, Value)| {
        slots::set_callback(lua, this, Event::Recv, callback, arg)
      },
    );

    methods.add_method(
      "setErrCb",
      |lua, this, (callback, arg): (Option<Function>, Value)| {
        slots::set_callback(lua, this, Event::Err, callback, arg)
      },
    );

    methods.add_method("lastError", |_, this, ()| {
      this.socket()?;
      Ok(this.last_error().map(|err| err.to_string()))
    });

    methods.add_method_mut("close", |lua, this, ()| this.close(lua));

    methods.add_meta_method_mut(MetaMethod::Close, |lua, this, _: MultiValue| {
      this.release_quietly(Some(lua));
      Ok(())
    });

    methods.add_meta_method(MetaMethod::ToString, |_, this, ()| {
      Ok(this.to_string())
    });
  }
}
