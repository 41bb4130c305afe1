#![allow(dead_code)]

use std::{
  cell::RefCell,
  collections::HashMap,
  io,
  rc::Rc,
  sync::{Arc, Mutex},
};

use ludp::{Config, Domain, NetError};
use mlua::Lua;
use pal_net::{ErrHandler, RecvHandler, Udp, UdpDriver};
use tracing_subscriber::fmt::MakeWriter;

/// Every native call the binding made, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  New(Domain),
  Free(u64),
  EnableBroadcast(u64),
  Bind(u64, String, u16),
  Connect(u64, String, u16),
  Send(u64, Vec<u8>),
  SendTo(u64, Vec<u8>, String, u16),
  SetRecvHandler(u64, bool),
  SetErrHandler(u64, bool),
}

#[derive(Default)]
struct Handlers {
  recv: Option<RecvHandler>,
  err: Option<ErrHandler>,
}

#[derive(Default)]
struct State {
  next_token: u64,
  sockets: HashMap<u64, Handlers>,
  calls: Vec<Call>,
  refuse_alloc: bool,
  refuse_ops: Option<NetError>,
}

/// Records native calls and fires events on demand.
#[derive(Clone, Default)]
pub struct MockDriver {
  state: Rc<RefCell<State>>,
}

impl MockDriver {
  pub fn calls(&self) -> Vec<Call> {
    self.state.borrow().calls.clone()
  }

  pub fn clear_calls(&self) {
    self.state.borrow_mut().calls.clear();
  }

  pub fn refuse_alloc(&self, refuse: bool) {
    self.state.borrow_mut().refuse_alloc = refuse;
  }

  /// Makes every subsequent socket operation fail with `err`.
  pub fn refuse_ops(&self, err: Option<NetError>) {
    self.state.borrow_mut().refuse_ops = err;
  }

  pub fn live(&self) -> usize {
    self.state.borrow().sockets.len()
  }

  pub fn last_token(&self) -> u64 {
    self.state.borrow().next_token
  }

  pub fn has_recv_handler(&self, token: u64) -> bool {
    let state = self.state.borrow();
    state.sockets.get(&token).is_some_and(|h| h.recv.is_some())
  }

  pub fn has_err_handler(&self, token: u64) -> bool {
    let state = self.state.borrow();
    state.sockets.get(&token).is_some_and(|h| h.err.is_some())
  }

  /// Delivers a datagram the way the driver would, from outside any borrow.
  /// Returns whether a handler was registered.
  pub fn fire_recv(
    &self,
    token: u64,
    payload: &[u8],
    addr: &str,
    port: u16,
  ) -> bool {
    let handler = self
      .state
      .borrow()
      .sockets
      .get(&token)
      .and_then(|h| h.recv.clone());
    match handler {
      Some(handler) => {
        handler(payload, addr, port);
        true
      }
      None => false,
    }
  }

  pub fn fire_err(&self, token: u64, err: NetError) -> bool {
    let handler =
      self.state.borrow().sockets.get(&token).and_then(|h| h.err.clone());
    match handler {
      Some(handler) => {
        handler(err);
        true
      }
      None => false,
    }
  }
}

impl UdpDriver for MockDriver {
  fn new_udp(&self, domain: Domain) -> Option<Box<dyn Udp>> {
    let mut state = self.state.borrow_mut();
    state.calls.push(Call::New(domain));
    if state.refuse_alloc {
      return None;
    }
    state.next_token += 1;
    let token = state.next_token;
    state.sockets.insert(token, Handlers::default());
    Some(Box::new(MockUdp { token, state: self.state.clone() }))
  }
}

struct MockUdp {
  token: u64,
  state: Rc<RefCell<State>>,
}

impl MockUdp {
  fn record(&self, call: Call) -> Result<(), NetError> {
    let mut state = self.state.borrow_mut();
    state.calls.push(call);
    state.refuse_ops.map_or(Ok(()), Err)
  }
}

impl Udp for MockUdp {
  fn token(&self) -> u64 {
    self.token
  }

  fn enable_broadcast(&self) -> Result<(), NetError> {
    self.record(Call::EnableBroadcast(self.token))
  }

  fn bind(&self, addr: &str, port: u16) -> Result<(), NetError> {
    self.record(Call::Bind(self.token, addr.into(), port))
  }

  fn connect(&self, addr: &str, port: u16) -> Result<(), NetError> {
    self.record(Call::Connect(self.token, addr.into(), port))
  }

  fn send(&self, data: &[u8]) -> Result<(), NetError> {
    self.record(Call::Send(self.token, data.to_vec()))
  }

  fn sendto(&self, data: &[u8], addr: &str, port: u16) -> Result<(), NetError> {
    self.record(Call::SendTo(self.token, data.to_vec(), addr.into(), port))
  }

  fn set_recv_handler(&self, handler: Option<RecvHandler>) {
    let mut state = self.state.borrow_mut();
    state.calls.push(Call::SetRecvHandler(self.token, handler.is_some()));
    if let Some(h) = state.sockets.get_mut(&self.token) {
      h.recv = handler;
    }
  }

  fn set_err_handler(&self, handler: Option<ErrHandler>) {
    let mut state = self.state.borrow_mut();
    state.calls.push(Call::SetErrHandler(self.token, handler.is_some()));
    if let Some(h) = state.sockets.get_mut(&self.token) {
      h.err = handler;
    }
  }
}

impl Drop for MockUdp {
  fn drop(&mut self) {
    let mut state = self.state.borrow_mut();
    state.calls.push(Call::Free(self.token));
    state.sockets.remove(&self.token);
  }
}

/// A Lua state with the module loaded as the global `udp`.
pub fn setup() -> (Lua, MockDriver) {
  setup_with(Config::new())
}

pub fn setup_with(config: Config) -> (Lua, MockDriver) {
  let lua = Lua::new();
  let driver = MockDriver::default();
  let udp = ludp::load(&lua, Rc::new(driver.clone()), config).unwrap();
  lua.globals().set("udp", udp).unwrap();
  (lua, driver)
}

pub fn exec(lua: &Lua, chunk: &str) {
  lua.load(chunk).exec().unwrap();
}

/// The error a chunk raised, as text.
pub fn exec_err(lua: &Lua, chunk: &str) -> String {
  lua.load(chunk).exec().expect_err("chunk should raise").to_string()
}

/// Whether `err` is the conversion error raised for a missing or mistyped
/// argument.
pub fn is_argument_error(err: &str) -> bool {
  err.contains("bad argument") || err.contains("error converting")
}

/// Log sink shared with a thread-local subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
  pub fn contents(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl io::Write for LogBuffer {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for LogBuffer {
  type Writer = LogBuffer;

  fn make_writer(&'a self) -> Self::Writer {
    self.clone()
  }
}

/// Captures everything logged on this thread until the guard drops.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
  let buf = LogBuffer::default();
  let subscriber = tracing_subscriber::fmt()
    .with_writer(buf.clone())
    .with_ansi(false)
    .with_max_level(tracing::Level::TRACE)
    .finish();
  (buf, tracing::subscriber::set_default(subscriber))
}
