//! # Connection Registry
//!
//! Owns every live [`Connection`], keyed by its mio poll token, with a
//! secondary index from the stable public [`ConnectionId`]. Tokens are
//! recycled by the reactor; ids never are, so event handlers and logs
//! always refer to connections by id.

use crate::connection::Connection;
use mio::Token;
use std::collections::HashMap;

/// Stable public identity of a connection, unique for the process lifetime
/// (and preserved across a handoff)
pub type ConnectionId = u64;

#[derive(Default)]
pub struct ConnectionRegistry {
    by_token: HashMap<Token, Connection>,
    id_index: HashMap<ConnectionId, Token>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, token: Token, conn: Connection) {
        self.id_index.insert(conn.id(), token);
        self.by_token.insert(token, conn);
    }

    pub fn get(&self, token: Token) -> Option<&Connection> {
        self.by_token.get(&token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.by_token.get_mut(&token)
    }

    pub fn by_id_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        let token = self.id_index.get(&id)?;
        self.by_token.get_mut(token)
    }

    pub fn remove(&mut self, token: Token) -> Option<Connection> {
        let conn = self.by_token.remove(&token)?;
        self.id_index.remove(&conn.id());
        Some(conn)
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }

    /// All current tokens, highest first, safe to iterate while mutating
    pub fn tokens_rev(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self.by_token.keys().copied().collect();
        tokens.sort_by(|a, b| b.0.cmp(&a.0));
        tokens
    }

    /// Queue a text line to every connection except `except` (if given)
    pub fn send_to_all(&mut self, text: &str, except: Option<ConnectionId>) {
        for conn in self.by_token.values_mut() {
            if Some(conn.id()) == except {
                continue;
            }
            conn.send_text(text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeaportConfig;
    use crate::protocol::RawProtocol;
    use std::net::TcpListener as StdTcpListener;

    fn test_conn(id: ConnectionId) -> Connection {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let std_stream = std::net::TcpStream::connect(addr).unwrap();
        std_stream.set_nonblocking(true).unwrap();
        let stream = mio::net::TcpStream::from_std(std_stream);
        Connection::new(id, stream, addr, Box::new(RawProtocol::new()), &SeaportConfig::default())
    }

    #[test]
    fn test_insert_indexes_both_ways() {
        let mut registry = ConnectionRegistry::new();
        registry.insert(Token(5), test_conn(42));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(Token(5)).unwrap().id(), 42);
        assert_eq!(registry.by_id_mut(42).unwrap().id(), 42);
    }

    #[test]
    fn test_remove_clears_the_id_index() {
        let mut registry = ConnectionRegistry::new();
        registry.insert(Token(5), test_conn(42));
        let removed = registry.remove(Token(5)).unwrap();
        assert_eq!(removed.id(), 42);
        assert!(registry.is_empty());
        assert!(registry.by_id_mut(42).is_none());
    }

    #[test]
    fn test_tokens_rev_is_descending() {
        let mut registry = ConnectionRegistry::new();
        registry.insert(Token(2), test_conn(1));
        registry.insert(Token(9), test_conn(2));
        registry.insert(Token(4), test_conn(3));
        assert_eq!(registry.tokens_rev(), vec![Token(9), Token(4), Token(2)]);
    }

    #[test]
    fn test_send_to_all_skips_excepted() {
        let mut registry = ConnectionRegistry::new();
        registry.insert(Token(1), test_conn(10));
        registry.insert(Token(2), test_conn(20));
        registry.send_to_all("hello", Some(20));
        assert_eq!(registry.get(Token(1)).unwrap().pending_send(), b"hello");
        assert!(registry.get(Token(2)).unwrap().pending_send().is_empty());
    }
}
