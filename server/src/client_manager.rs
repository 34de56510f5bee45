//! Client connection management and RPC queuing for the authoritative server
//!
//! This module handles the server-side management of connected clients, including:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Per-connection RPC buffering in sequence order
//! - The outbound channel each connection's writer task drains
//!
//! Calls from one client are executed in the order that client sent them.
//! There is no ordering guarantee across clients.

use log::{debug, info, warn};
use shared::{Packet, RpcEnvelope, ServerRpc};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Clients silent for longer than this are dropped
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// Serial-number comparison, so ordering survives the client's sequence
/// counter wrapping around
fn is_newer(sequence: u32, than: u32) -> bool {
    (sequence.wrapping_sub(than) as i32) > 0
}

/// Represents a connected client and its queued calls
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier, also the id of the character it owns
    pub id: u32,
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Newest RPC sequence number already executed
    pub last_processed_rpc: u32,
    /// Calls waiting for the next tick, sorted by sequence
    pub pending_rpcs: Vec<RpcEnvelope>,
    outbound: mpsc::UnboundedSender<Packet>,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr, outbound: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            last_processed_rpc: 0,
            pending_rpcs: Vec::new(),
            outbound,
        }
    }

    /// Queues a call in sequence order.
    ///
    /// Calls not newer than the last executed sequence are duplicates and
    /// are dropped.
    pub fn add_rpc(&mut self, envelope: RpcEnvelope) -> bool {
        self.last_seen = Instant::now();
        let last = self.last_processed_rpc;
        if !is_newer(envelope.sequence, last) {
            return false;
        }

        let distance = envelope.sequence.wrapping_sub(last);
        let index = self
            .pending_rpcs
            .partition_point(|queued| queued.sequence.wrapping_sub(last) < distance);
        if self
            .pending_rpcs
            .get(index)
            .is_some_and(|queued| queued.sequence == envelope.sequence)
        {
            return false;
        }

        self.pending_rpcs.insert(index, envelope);
        true
    }

    /// Enqueues a packet on this client's channel. False once the writer is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Owns every connected client and routes packets onto their channels
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    /// Client ids start from 1 and are never reused
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    /// Returns `None` when the server is at capacity
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
    ) -> Option<u32> {
        if self.is_full() {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbound));

        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Returns false if the client id is unknown or the call is a duplicate
    pub fn add_rpc(&mut self, client_id: u32, envelope: RpcEnvelope) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => client.add_rpc(envelope),
            None => false,
        }
    }

    /// Takes every queued call, grouped by client in ascending id order and
    /// in sequence order within each client
    pub fn drain_rpcs(&mut self) -> Vec<(u32, ServerRpc)> {
        let mut ids: Vec<u32> = self.clients.keys().copied().collect();
        ids.sort_unstable();

        let mut drained = Vec::new();
        for id in ids {
            let Some(client) = self.clients.get_mut(&id) else {
                continue;
            };
            for envelope in client.pending_rpcs.drain(..) {
                client.last_processed_rpc = envelope.sequence;
                drained.push((id, envelope.rpc));
            }
        }
        drained
    }

    pub fn send_to(&self, client_id: u32, packet: Packet) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.send(packet),
            None => {
                debug!("Dropping packet for unknown client {}", client_id);
                false
            }
        }
    }

    /// Enqueues a copy of `packet` on every client's channel
    pub fn multicast(&self, packet: &Packet) {
        for client in self.clients.values() {
            if !client.send(packet.clone()) {
                warn!("Client {} channel closed", client.id);
            }
        }
    }

    /// Removes and returns clients that have been silent too long
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(CLIENT_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    fn envelope(sequence: u32, value: f32) -> RpcEnvelope {
        RpcEnvelope {
            sequence,
            rpc: ServerRpc::MoveRight { value },
        }
    }

    #[test]
    fn test_client_orders_rpcs_by_sequence() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut client = Client::new(1, test_addr(), tx);

        assert!(client.add_rpc(envelope(2, 0.5)));
        assert!(client.add_rpc(envelope(1, 1.0)));
        assert!(!client.add_rpc(envelope(2, 0.5)));

        let sequences: Vec<u32> = client.pending_rpcs.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_sequence_wraparound_keeps_accepting() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = manager.add_client(test_addr(), tx).unwrap();

        manager.clients.get_mut(&id).unwrap().last_processed_rpc = u32::MAX - 1;
        assert!(manager.add_rpc(id, envelope(u32::MAX, 1.0)));
        assert_eq!(manager.drain_rpcs().len(), 1);

        assert!(manager.add_rpc(id, envelope(1, 0.5)));
        assert!(manager.add_rpc(id, envelope(0, 0.25)));
        assert!(!manager.add_rpc(id, envelope(u32::MAX, 1.0)));

        assert_eq!(
            manager.drain_rpcs(),
            vec![
                (id, ServerRpc::MoveRight { value: 0.25 }),
                (id, ServerRpc::MoveRight { value: 0.5 }),
            ]
        );
        assert_eq!(manager.clients[&id].last_processed_rpc, 1);
    }

    #[test]
    fn test_client_timeout() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut client = Client::new(1, test_addr(), tx);

        assert!(!client.is_timed_out(Duration::from_secs(1)));
        client.last_seen = Instant::now() - Duration::from_secs(2);
        assert!(client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        let (tx, _rx) = mpsc::unbounded_channel();

        assert_eq!(manager.add_client(test_addr(), tx.clone()), Some(1));
        assert!(manager.is_full());
        assert_eq!(manager.add_client(test_addr2(), tx), None);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();

        let first = manager.add_client(test_addr(), tx.clone()).unwrap();
        assert!(manager.remove_client(&first));
        assert!(!manager.remove_client(&first));

        let second = manager.add_client(test_addr(), tx).unwrap();
        assert_eq!(second, 2);
        assert_eq!(manager.find_client_by_addr(test_addr()), Some(2));
    }

    #[test]
    fn test_drain_keeps_per_client_order() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = manager.add_client(test_addr(), tx.clone()).unwrap();
        let b = manager.add_client(test_addr2(), tx).unwrap();

        manager.add_rpc(b, envelope(1, -1.0));
        manager.add_rpc(a, envelope(2, 0.25));
        manager.add_rpc(a, envelope(1, 1.0));

        let drained = manager.drain_rpcs();
        assert_eq!(
            drained,
            vec![
                (a, ServerRpc::MoveRight { value: 1.0 }),
                (a, ServerRpc::MoveRight { value: 0.25 }),
                (b, ServerRpc::MoveRight { value: -1.0 }),
            ]
        );

        // Already executed sequences are rejected as duplicates
        assert!(!manager.add_rpc(a, envelope(2, 0.25)));
        assert!(manager.drain_rpcs().is_empty());
    }

    #[test]
    fn test_add_rpc_to_unknown_client() {
        let mut manager = ClientManager::new(2);
        assert!(!manager.add_rpc(999, envelope(1, 1.0)));
    }

    #[tokio::test]
    async fn test_send_to_targets_one_channel() {
        let mut manager = ClientManager::new(2);
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = manager.add_client(test_addr(), tx_a).unwrap();
        manager.add_client(test_addr2(), tx_b).unwrap();

        assert!(manager.send_to(a, Packet::MoveForwardAck { value: 1.0 }));
        assert_eq!(
            rx_a.recv().await,
            Some(Packet::MoveForwardAck { value: 1.0 })
        );
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multicast_reaches_every_channel() {
        let mut manager = ClientManager::new(2);
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        manager.add_client(test_addr(), tx_a).unwrap();
        manager.add_client(test_addr2(), tx_b).unwrap();

        let packet = Packet::StunBegan { character: 2 };
        manager.multicast(&packet);

        assert_eq!(rx_a.recv().await, Some(packet.clone()));
        assert_eq!(rx_b.recv().await, Some(packet));
    }

    #[test]
    fn test_check_timeouts_removes_silent_clients() {
        let mut manager = ClientManager::new(2);
        let (tx, _rx) = mpsc::unbounded_channel();
        let a = manager.add_client(test_addr(), tx.clone()).unwrap();
        manager.add_client(test_addr2(), tx).unwrap();

        manager.clients.get_mut(&a).unwrap().last_seen =
            Instant::now() - CLIENT_TIMEOUT - Duration::from_secs(1);

        assert_eq!(manager.check_timeouts(), vec![a]);
        assert_eq!(manager.len(), 1);
    }
}
