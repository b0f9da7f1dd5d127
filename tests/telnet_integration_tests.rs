//! End-to-end tests driving a live reactor over loopback sockets with a
//! real telnet-speaking client.

use seaport::config::ProtocolMode;
use seaport::{Propagation, ProtocolTable, Reactor, SeaportConfig, SessionEvent};
use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::rc::Rc;
use std::time::Duration;

const IAC: u8 = 255;
const SB: u8 = 250;
const SE: u8 = 240;
const WILL: u8 = 251;
const DO: u8 = 253;
const TTYPE: u8 = 24;
const NAWS: u8 = 31;
const SEND: u8 = 1;
const IS: u8 = 0;

fn telnet_reactor() -> Reactor {
    let mut config = SeaportConfig::default();
    config.server.port = 0;
    config.server.mode = ProtocolMode::Telnet;
    config.timeouts.poll_interval = Duration::from_millis(10);
    Reactor::new(config, ProtocolTable::standard()).unwrap()
}

/// Iterate the reactor while collecting client-side bytes until `want`
/// returns true or the attempt budget runs out
fn pump(reactor: &mut Reactor, client: &mut TcpStream, want: impl Fn(&[u8]) -> bool) -> Vec<u8> {
    let mut buf = [0u8; 256];
    let mut collected = Vec::new();
    for _ in 0..200 {
        reactor.iterate().unwrap();
        match client.read(&mut buf) {
            Ok(n) if n > 0 => collected.extend_from_slice(&buf[..n]),
            _ => {}
        }
        if want(&collected) {
            break;
        }
    }
    collected
}

fn connect(reactor: &mut Reactor) -> TcpStream {
    let addr = reactor.bind().unwrap();
    let client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(20)))
        .unwrap();
    client
}

#[test]
fn test_server_requests_ttype_and_naws_on_connect() {
    let mut reactor = telnet_reactor();
    let mut client = connect(&mut reactor);

    let handshake = pump(&mut reactor, &mut client, |got| got.len() >= 6);
    assert_eq!(handshake, vec![IAC, DO, TTYPE, IAC, DO, NAWS]);
}

#[test]
fn test_will_ttype_gets_one_send_subnegotiation() {
    let mut reactor = telnet_reactor();
    let mut client = connect(&mut reactor);
    pump(&mut reactor, &mut client, |got| got.len() >= 6);

    client.write_all(&[IAC, WILL, TTYPE]).unwrap();
    let reply = pump(&mut reactor, &mut client, |got| got.len() >= 6);
    // A single SEND sub-negotiation, not a second DO
    assert_eq!(reply, vec![IAC, SB, TTYPE, SEND, IAC, SE]);
}

#[test]
fn test_full_session_negotiates_and_relays_lines() {
    let mut reactor = telnet_reactor();
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    reactor.bus_mut().on_receive(Box::new(move |registry, id, event| {
        if let SessionEvent::Receive(data) = event {
            sink.borrow_mut().push(data.clone());
            if let Some(conn) = registry.by_id_mut(id) {
                let mut reply = b"you said: ".to_vec();
                reply.extend_from_slice(data);
                reply.push(b'\n');
                let _ = conn.send(&reply);
            }
        }
        Propagation::Continue
    }));
    let mut client = connect(&mut reactor);
    pump(&mut reactor, &mut client, |got| got.len() >= 6);

    // Answer the negotiation like a real client
    client.write_all(&[IAC, WILL, TTYPE, IAC, WILL, NAWS]).unwrap();
    pump(&mut reactor, &mut client, |got| got.len() >= 6);
    let mut is_reply = vec![IAC, SB, TTYPE, IS];
    is_reply.extend_from_slice(b"xterm");
    is_reply.extend_from_slice(&[IAC, SE]);
    client.write_all(&is_reply).unwrap();
    client
        .write_all(&[IAC, SB, NAWS, 0, 80, 0, 24, IAC, SE])
        .unwrap();

    client.write_all(b"hello there\r\n").unwrap();
    let echoed = pump(&mut reactor, &mut client, |got| {
        got.windows(2).any(|w| w == b"\r\n")
    });

    assert_eq!(*lines.borrow(), vec![b"hello there".to_vec()]);
    assert_eq!(echoed, b"you said: hello there\r\n");
}

#[test]
fn test_line_split_across_packets_decodes_once() {
    let mut reactor = telnet_reactor();
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    reactor.bus_mut().on_receive(Box::new(move |_, _, event| {
        if let SessionEvent::Receive(data) = event {
            sink.borrow_mut().push(data.clone());
        }
        Propagation::Continue
    }));
    let mut client = connect(&mut reactor);
    pump(&mut reactor, &mut client, |got| got.len() >= 6);

    client.write_all(b"hel").unwrap();
    for _ in 0..10 {
        reactor.iterate().unwrap();
    }
    client.write_all(b"lo\r\n").unwrap();
    pump(&mut reactor, &mut client, |_| !lines.borrow().is_empty());

    assert_eq!(*lines.borrow(), vec![b"hello".to_vec()]);
}

#[test]
fn test_escaped_iac_reaches_the_service_literally() {
    let mut reactor = telnet_reactor();
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    reactor.bus_mut().on_receive(Box::new(move |_, _, event| {
        if let SessionEvent::Receive(data) = event {
            sink.borrow_mut().push(data.clone());
        }
        Propagation::Continue
    }));
    let mut client = connect(&mut reactor);
    pump(&mut reactor, &mut client, |got| got.len() >= 6);

    client.write_all(&[b'a', IAC, IAC, b'b', b'\r', b'\n']).unwrap();
    pump(&mut reactor, &mut client, |_| !lines.borrow().is_empty());

    assert_eq!(*lines.borrow(), vec![vec![b'a', IAC, b'b']]);
}

#[test]
fn test_unsupported_option_refused_exactly_once() {
    let mut reactor = telnet_reactor();
    let mut client = connect(&mut reactor);
    pump(&mut reactor, &mut client, |got| got.len() >= 6);

    const LINEMODE: u8 = 34;
    client.write_all(&[IAC, WILL, LINEMODE]).unwrap();
    let first = pump(&mut reactor, &mut client, |got| got.len() >= 3);
    assert_eq!(first, vec![IAC, 254, LINEMODE]); // DONT

    // A repeat of the same request draws no second refusal
    client.write_all(&[IAC, WILL, LINEMODE]).unwrap();
    client.write_all(b"marker\r\n").unwrap();
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    reactor.bus_mut().on_receive(Box::new(move |_, _, event| {
        if let SessionEvent::Receive(data) = event {
            sink.borrow_mut().push(data.clone());
        }
        Propagation::Continue
    }));
    let after = pump(&mut reactor, &mut client, |_| !lines.borrow().is_empty());
    assert!(after.is_empty());
}
