use std::{net::UdpSocket, rc::Rc, time::Duration};

use ludp::Config;
use mlua::Lua;
use pal_net::EventLoop;

const TIMEOUT: Duration = Duration::from_secs(5);

fn setup() -> (Lua, EventLoop) {
  let lua = Lua::new();
  let event_loop = EventLoop::new();
  let exports =
    ludp::load(&lua, Rc::new(event_loop.clone()), Config::default()).unwrap();
  lua.globals().set("udp", exports).unwrap();
  (lua, event_loop)
}

fn free_port() -> u16 {
  UdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

#[test]
fn test_loopback_datagram_reaches_lua() {
  let (lua, event_loop) = setup();
  let port = free_port();
  lua.globals().set("port", port).unwrap();
  lua
    .load(
      r#"
      h = udp.open("INET")
      assert(h:bind("127.0.0.1", port))
      h:setRecvCb(function(data, addr, from, tag)
        received = { data = data, addr = addr, port = from, tag = tag }
      end, "loop")
      "#,
    )
    .exec()
    .unwrap();

  let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
  let peer_port = peer.local_addr().unwrap().port();
  peer.send_to(b"hello lua", ("127.0.0.1", port)).unwrap();

  let done = event_loop
    .run_until(|| lua.globals().contains_key("received").unwrap(), TIMEOUT)
    .unwrap();
  assert!(done, "datagram never dispatched");

  let received: mlua::Table = lua.globals().get("received").unwrap();
  assert_eq!(received.get::<String>("data").unwrap(), "hello lua");
  assert_eq!(received.get::<String>("addr").unwrap(), "127.0.0.1");
  assert_eq!(received.get::<u16>("port").unwrap(), peer_port);
  assert_eq!(received.get::<String>("tag").unwrap(), "loop");
}

#[test]
fn test_lua_sendto_reaches_peer() {
  let (lua, event_loop) = setup();
  let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
  peer.set_read_timeout(Some(TIMEOUT)).unwrap();
  lua
    .globals()
    .set("peer_port", peer.local_addr().unwrap().port())
    .unwrap();

  lua
    .load(
      r#"
      h = udp.open("INET")
      assert(h:sendto("from lua", "127.0.0.1", peer_port))
      "#,
    )
    .exec()
    .unwrap();

  let mut buf = [0u8; 64];
  let (n, _) = peer.recv_from(&mut buf).unwrap();
  assert_eq!(&buf[..n], b"from lua");
  assert_eq!(event_loop.len(), 1);
}

#[test]
fn test_close_releases_loop_socket() {
  let (lua, event_loop) = setup();
  lua
    .load(
      r#"
      h = udp.open("INET")
      h:setRecvCb(function() end)
      "#,
    )
    .exec()
    .unwrap();
  assert_eq!(event_loop.len(), 1);

  lua.load("h:close()").exec().unwrap();
  assert!(event_loop.is_empty());
  assert_eq!(event_loop.tick(Some(Duration::from_millis(1))).unwrap(), 0);
}

#[test]
fn test_echo_round_trip() {
  let (lua, event_loop) = setup();
  let port = free_port();
  lua.globals().set("port", port).unwrap();
  lua
    .load(
      r#"
      echoed = 0
      h = udp.open("INET")
      assert(h:bind("127.0.0.1", port))
      h:setRecvCb(function(data, addr, from)
        assert(h:sendto(data, addr, from))
        echoed = echoed + 1
      end)
      "#,
    )
    .exec()
    .unwrap();

  let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
  peer.set_read_timeout(Some(TIMEOUT)).unwrap();
  peer.send_to(b"marco", ("127.0.0.1", port)).unwrap();

  let done = event_loop
    .run_until(|| lua.globals().get::<i64>("echoed").unwrap() == 1, TIMEOUT)
    .unwrap();
  assert!(done);

  let mut buf = [0u8; 16];
  let (n, from) = peer.recv_from(&mut buf).unwrap();
  assert_eq!(&buf[..n], b"marco");
  assert_eq!(from.port(), port);
}
