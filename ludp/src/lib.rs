//! # ludp - UDP handles for Lua
//!
//! Exposes datagram sockets from a [`pal_net`] driver to Lua 5.4 scripts as
//! userdata handles with an explicit Open/Closed lifecycle and script
//! callbacks for receive and error events.
//!
//! ```lua
//! local udp = require("udp")
//! local h = udp.open("INET")          -- nil for an unknown domain
//! assert(h:bind("0.0.0.0", 5353))
//! h:setRecvCb(function(data, addr, port, ctx)
//!   print(#data, addr, port, ctx)
//! end, "ctx")
//! h:setErrCb(function() print("udp error: " .. h:lastError()) end)
//! ```
//!
//! ## Errors
//!
//! Two tiers. Programmer errors raise: wrong argument types, any use of a
//! closed handle, closing twice. Operational failures return `false` (or
//! `nil` from `open`): unknown domain, port outside `0..=65535`, anything the
//! native layer refuses.
//!
//! Errors raised *inside* a callback never reach the driver. They are logged
//! through [`tracing`] at `error` level and discarded.
//!
//! ## Embedding
//!
//! ```rust
//! use std::rc::Rc;
//! use mlua::Lua;
//! use pal_net::EventLoop;
//!
//! let lua = Lua::new();
//! let event_loop = EventLoop::new();
//! let udp = ludp::load(&lua, Rc::new(event_loop.clone()), ludp::Config::new())?;
//! lua.globals().set("udp", udp)?;
//!
//! lua.load(r#"assert(udp.open("bogus") == nil)"#).exec()?;
//! # Ok::<(), mlua::Error>(())
//! ```
//!
//! The embedding program drives `event_loop.tick(..)`; callbacks run inside
//! that call.

use std::rc::Rc;

use mlua::{Lua, Table};
use pal_net::UdpDriver;

mod config;
mod dispatch;
mod error;
mod facade;
mod handle;
mod slots;

pub use config::Config;
pub use error::Error;
pub use handle::{HandleId, State, UdpHandle};
pub use pal_net::{Domain, NetError};
pub use slots::{Presence, Role};

/// Builds the `udp` module table for `lua`.
///
/// Registering it (`package.loaded`, a global, ...) is up to the caller.
pub fn load(
  lua: &Lua,
  driver: Rc<dyn UdpDriver>,
  config: Config,
) -> mlua::Result<Table> {
  facade::module(lua, driver, Rc::new(config))
}
