//! Connection registry: who is listening, and how to reach them.
//!
//! Each connection gets a bounded outbound queue. The registry only ever
//! pushes with `try_send`, so a fan-out never waits on a consumer. A consumer
//! whose queue is closed or full is dropped from the registry; its writer
//! task sees the queue close and shuts the socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use machinefeed_core::FeedMessage;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// A serialized feed message, shared between all queues it is pushed to.
pub type Frame = Arc<str>;

/// Handle returned to a newly registered consumer.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    /// Outbound frames. The init frame is already queued.
    pub frames: mpsc::Receiver<Frame>,
}

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
}

pub struct ConnectionRegistry {
    connections: Mutex<HashMap<Uuid, mpsc::Sender<Frame>>>,
    init_frame: Frame,
    queue_depth: usize,
    broadcasts: AtomicU64,
}

impl ConnectionRegistry {
    /// `init` is sent first on every new connection.
    pub fn new(init: &FeedMessage, queue_depth: usize) -> serde_json::Result<Self> {
        Ok(Self {
            connections: Mutex::new(HashMap::new()),
            init_frame: Frame::from(init.to_json()?),
            queue_depth: queue_depth.max(1),
            broadcasts: AtomicU64::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, mpsc::Sender<Frame>>> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a consumer and queue its init frame.
    ///
    /// The init frame is queued under the same lock that `broadcast` takes,
    /// so it always precedes the first update the consumer receives.
    pub fn connect(&self) -> Connection {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.queue_depth);

        let mut connections = self.lock();
        if let Err(e) = tx.try_send(Arc::clone(&self.init_frame)) {
            log::warn!("consumer {id}: cannot queue init frame: {e}");
        }
        connections.insert(id, tx);
        log::info!("consumer {id} connected ({} active)", connections.len());

        Connection { id, frames: rx }
    }

    /// Remove a consumer. Returns false if it was already gone.
    pub fn disconnect(&self, id: Uuid) -> bool {
        let mut connections = self.lock();
        let removed = connections.remove(&id).is_some();
        if removed {
            log::info!("consumer {id} disconnected ({} active)", connections.len());
        }
        removed
    }

    /// Push one frame to every registered consumer.
    ///
    /// Consumers whose queue is closed or full are removed; everyone else
    /// still receives the frame.
    pub fn broadcast(&self, frame: Frame) -> Delivery {
        let mut connections = self.lock();
        let mut delivery = Delivery::default();
        let mut stale = Vec::new();

        for (id, tx) in connections.iter() {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::warn!("consumer {id} is not keeping up, dropping it");
                    stale.push(*id);
                }
                Err(TrySendError::Closed(_)) => stale.push(*id),
            }
        }

        for id in &stale {
            connections.remove(id);
        }
        delivery.dropped = stale.len();
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        delivery
    }

    /// Drop every connection. Each writer sees its queue close.
    pub fn clear(&self) {
        let mut connections = self.lock();
        let n = connections.len();
        connections.clear();
        if n > 0 {
            log::info!("closed {n} consumer connection(s)");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of `broadcast` calls so far.
    pub fn broadcasts(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machinefeed_core::{MachineId, ReadingRecord, RecordStore};

    fn registry(queue_depth: usize) -> ConnectionRegistry {
        let store = RecordStore::from_histories([
            (MachineId::new("Mill"), vec![ReadingRecord::new()]),
            (MachineId::new("Press"), vec![ReadingRecord::new()]),
        ])
        .unwrap();
        ConnectionRegistry::new(&FeedMessage::init(&store), queue_depth).unwrap()
    }

    fn parse(frame: &Frame) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[test]
    fn test_connect_queues_exactly_one_init() {
        let registry = registry(4);
        let mut conn = registry.connect();

        let init = parse(&conn.frames.try_recv().unwrap());
        assert_eq!(init["type"], "init");
        let ids: Vec<&str> = init["machines"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["machineId"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["Mill", "Press"]);
        assert!(init["machines"].as_array().unwrap().iter().all(|m| m["status"] == "OFFLINE"));
        assert!(conn.frames.try_recv().is_err());
    }

    #[test]
    fn test_zero_depth_still_delivers_init() {
        let registry = registry(0);
        let mut conn = registry.connect();
        assert_eq!(parse(&conn.frames.try_recv().unwrap())["type"], "init");
        assert_eq!(registry.broadcast(Frame::from("tick")).delivered, 1);
    }

    #[test]
    fn test_init_precedes_updates() {
        let registry = registry(4);
        let mut conn = registry.connect();
        registry.broadcast(Frame::from(r#"{"type":"update","data":[]}"#));

        assert_eq!(parse(&conn.frames.try_recv().unwrap())["type"], "init");
        assert_eq!(parse(&conn.frames.try_recv().unwrap())["type"], "update");
    }

    #[test]
    fn test_closed_consumer_does_not_block_others() {
        let registry = registry(4);
        let mut conns: Vec<Connection> = (0..4).map(|_| registry.connect()).collect();
        let gone = conns.remove(1);
        drop(gone);

        let delivery = registry.broadcast(Frame::from("tick"));
        assert_eq!(delivery, Delivery { delivered: 3, dropped: 1 });
        assert_eq!(registry.len(), 3);

        for conn in &mut conns {
            assert_eq!(&*conn.frames.try_recv().unwrap(), registry.init_frame.as_ref());
            assert_eq!(&*conn.frames.try_recv().unwrap(), "tick");
        }
    }

    #[test]
    fn test_full_queue_drops_consumer() {
        let registry = registry(2);
        let mut slow = registry.connect();
        let mut fast = registry.connect();
        fast.frames.try_recv().unwrap();

        // slow: init + tick-1 fills the queue.
        assert_eq!(registry.broadcast(Frame::from("tick-1")).delivered, 2);
        fast.frames.try_recv().unwrap();
        let delivery = registry.broadcast(Frame::from("tick-2"));
        assert_eq!(delivery, Delivery { delivered: 1, dropped: 1 });
        assert_eq!(registry.len(), 1);

        // Already-queued frames still drain, then the queue reports closed.
        assert!(slow.frames.try_recv().is_ok());
        assert!(slow.frames.try_recv().is_ok());
        assert!(slow.frames.try_recv().is_err());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let registry = registry(1);
        let conn = registry.connect();
        assert!(registry.disconnect(conn.id));
        assert!(!registry.disconnect(conn.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_closes_queues() {
        let registry = registry(4);
        let mut conn = registry.connect();
        registry.clear();
        assert!(registry.is_empty());
        conn.frames.try_recv().unwrap();
        assert!(matches!(
            conn.frames.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn test_broadcast_counter() {
        let registry = registry(1);
        registry.broadcast(Frame::from("a"));
        registry.broadcast(Frame::from("b"));
        assert_eq!(registry.broadcasts(), 2);
    }
}
