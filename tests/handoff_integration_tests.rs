//! Serialize a live reactor and restore it as if a new process had taken
//! over, checking that clients and mid-flight protocol state carry across.

#![cfg(unix)]

use seaport::config::ProtocolMode;
use seaport::{Propagation, ProtocolTable, Reactor, SeaportConfig, SessionEvent};
use std::cell::RefCell;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::rc::Rc;
use std::time::Duration;

fn telnet_config() -> SeaportConfig {
    let mut config = SeaportConfig::default();
    config.server.port = 0;
    config.server.mode = ProtocolMode::Telnet;
    config.timeouts.poll_interval = Duration::from_millis(10);
    config
}

fn collect_lines(reactor: &mut Reactor) -> Rc<RefCell<Vec<Vec<u8>>>> {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    reactor.bus_mut().on_receive(Box::new(move |_, _, event| {
        if let SessionEvent::Receive(data) = event {
            sink.borrow_mut().push(data.clone());
        }
        Propagation::Continue
    }));
    lines
}

#[test]
fn test_handoff_preserves_connection_and_partial_line() {
    let config = telnet_config();
    let mut old = Reactor::new(config.clone(), ProtocolTable::standard()).unwrap();
    let addr = old.bind().unwrap();

    let mut client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(20)))
        .unwrap();

    // Let the old reactor accept and consume a partial line
    client.write_all(b"par").unwrap();
    for _ in 0..50 {
        old.iterate().unwrap();
        if old.connections().len() == 1 {
            break;
        }
    }
    for _ in 0..10 {
        old.iterate().unwrap();
    }
    assert_eq!(old.connections().len(), 1);

    let blob = old.serialize().unwrap();
    // In a real handoff the old process exits; here both reactors share
    // the descriptors, so the old one must not close them
    std::mem::forget(old);

    let mut new = Reactor::restore(config, ProtocolTable::standard(), &blob).unwrap();
    assert_eq!(new.connections().len(), 1);
    let lines = collect_lines(&mut new);

    // The partial line completes in the new process with nothing dropped
    client.write_all(b"tial\r\n").unwrap();
    let mut buf = [0u8; 64];
    for _ in 0..100 {
        new.iterate().unwrap();
        let _ = client.read(&mut buf);
        if !lines.borrow().is_empty() {
            break;
        }
    }
    assert_eq!(*lines.borrow(), vec![b"partial".to_vec()]);
}

#[test]
fn test_restored_listener_still_accepts() {
    let config = telnet_config();
    let mut old = Reactor::new(config.clone(), ProtocolTable::standard()).unwrap();
    let addr = old.bind().unwrap();

    let blob = old.serialize().unwrap();
    std::mem::forget(old);

    let mut new = Reactor::restore(config, ProtocolTable::standard(), &blob).unwrap();
    let mut client = TcpStream::connect(addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_millis(20)))
        .unwrap();

    // The new process accepts and opens negotiation as usual
    let mut buf = [0u8; 16];
    let mut got = Vec::new();
    for _ in 0..100 {
        new.iterate().unwrap();
        if let Ok(n) = client.read(&mut buf) {
            got.extend_from_slice(&buf[..n]);
        }
        if got.len() >= 6 {
            break;
        }
    }
    assert_eq!(got, vec![255, 253, 24, 255, 253, 31]);
}
