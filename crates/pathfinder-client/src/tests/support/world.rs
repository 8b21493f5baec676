//! BDD test world holding a client and its recording connection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::recording_connection::ConnectionHandle;
use super::{client_in_state, config, entity_message};
use crate::kind::{EntityKind, MessageKind};
use crate::{
    Client, ClientError, Cluster, Commodity, ConnectionState, Coordinate, Delivery,
    DispatchError, EntityId, NewCommodity, Reply, Transport,
};

/// Shared state exercised by BDD step implementations.
pub struct TestWorld {
    /// Client under test.
    pub client: Client,
    /// View of the connection the client writes to.
    pub connection: ConnectionHandle,
    /// Transport handle fetched for subscription scenarios.
    pub transport: Option<Transport>,
    /// Outstanding cluster read.
    pub cluster_reply: Option<Reply<Cluster>>,
    /// Outstanding transport read.
    pub transport_reply: Option<Reply<Transport>>,
    /// Outstanding commodity creates, in call order.
    pub create_replies: Vec<Reply<Commodity>>,
    /// Last synchronous failure of a client operation.
    pub last_error: Option<ClientError>,
    /// Outcome of the last inbound message.
    pub last_dispatch: Option<Result<Delivery, DispatchError>>,
    /// Values returned by each `close` call, in order.
    pub close_results: Vec<usize>,
    /// Outcomes of subscribe calls, in order.
    pub subscribe_outcomes: Vec<bool>,
    counters: HashMap<String, Arc<AtomicUsize>>,
}

impl TestWorld {
    /// Builds a world whose connection reports `state`.
    #[must_use]
    pub fn new(state: ConnectionState) -> Self {
        let (client, connection) = client_in_state(state, &config());
        Self {
            client,
            connection,
            transport: None,
            cluster_reply: None,
            transport_reply: None,
            create_replies: Vec::new(),
            last_error: None,
            last_dispatch: None,
            close_results: Vec::new(),
            subscribe_outcomes: Vec::new(),
            counters: HashMap::new(),
        }
    }

    /// Feeds one inbound message to the client.
    pub fn receive(&mut self, text: &str) {
        self.last_dispatch = Some(self.client.handle_message(text));
    }

    /// Reads cluster `id`, keeping the reply or the synchronous error.
    pub fn request_cluster(&mut self, id: i64) {
        match self.client.get_cluster(EntityId::new(id)) {
            Ok(reply) => self.cluster_reply = Some(reply),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Reads transport `id`, keeping the reply or the synchronous error.
    pub fn request_transport(&mut self, id: i64) {
        match self.client.get_transport(EntityId::new(id)) {
            Ok(reply) => self.transport_reply = Some(reply),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Creates `count` commodities in cluster 1.
    pub fn create_commodities(&mut self, count: usize) {
        for index in 0..count {
            let offset = f64::from(u32::try_from(index).unwrap_or(u32::MAX));
            let commodity = NewCommodity::new(
                Coordinate::new(offset, 0.0),
                Coordinate::new(0.0, offset),
                EntityId::new(1),
            );
            match self.client.create_commodity(&commodity) {
                Ok(reply) => self.create_replies.push(reply),
                Err(error) => self.last_error = Some(error),
            }
        }
    }

    /// Fetches transport `id` and keeps the handle.
    pub fn fetch_transport(&mut self, id: i64) {
        let mut reply = self
            .client
            .get_transport(EntityId::new(id))
            .expect("transport read should be accepted");
        self.receive(&entity_message(MessageKind::Read, EntityKind::Transport, id));
        let transport = reply
            .try_take()
            .expect("read reply should have arrived")
            .expect("read should succeed");
        self.transport = Some(transport);
    }

    /// Subscribes the kept transport with a callback counting into `label`.
    pub fn subscribe_transport(&mut self, label: &str) {
        let counter = Arc::clone(self.counters.entry(label.to_owned()).or_default());
        let transport = self.transport.as_ref().expect("no transport fetched");
        let subscribed = transport.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        match subscribed {
            Ok(outcome) => self.subscribe_outcomes.push(outcome.is_reused()),
            Err(error) => self.last_error = Some(error),
        }
    }

    /// Number of updates seen by the callback registered under `label`.
    #[must_use]
    pub fn updates_seen(&self, label: &str) -> usize {
        self.counters
            .get(label)
            .map_or(0, |counter| counter.load(Ordering::SeqCst))
    }

    /// Closes the client, recording how many calls were failed.
    pub fn close(&mut self) {
        self.close_results.push(self.client.close());
    }
}
