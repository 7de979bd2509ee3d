use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::trace;
use uuid::Uuid;

use codemates_types::events::{GatewayEvent, RowFilter, Table, TableChange};

/// One realtime channel registered by a client.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub table: Table,
    pub filter: Option<RowFilter>,
}

struct ConnectionEntry {
    user_id: Uuid,
    tx: mpsc::UnboundedSender<GatewayEvent>,
    /// subscription_id -> subscription
    subscriptions: HashMap<String, Subscription>,
}

/// Manages all connected clients, their table subscriptions, and presence.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for global events (presence)
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Track online users: user_id -> (username, open connections)
    online_users: RwLock<HashMap<Uuid, (String, usize)>>,

    /// Per-connection targeted channels and subscriptions: conn_id -> entry
    connections: RwLock<HashMap<Uuid, ConnectionEntry>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online_users: RwLock::new(HashMap::new()),
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to global gateway events. Returns a broadcast receiver.
    pub fn subscribe_global(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a connection's targeted channel. Returns (conn_id, receiver).
    pub async fn register_connection(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(
            conn_id,
            ConnectionEntry {
                user_id,
                tx,
                subscriptions: HashMap::new(),
            },
        );
        (conn_id, rx)
    }

    /// Drop a connection and every subscription it held.
    pub async fn unregister_connection(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Send a targeted event to one connection.
    pub async fn send_to_connection(&self, conn_id: Uuid, event: GatewayEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(entry) = connections.get(&conn_id) {
            let _ = entry.tx.send(event);
        }
    }

    /// Register (or replace) a subscription. Returns false for an unknown connection.
    pub async fn subscribe(
        &self,
        conn_id: Uuid,
        subscription_id: String,
        table: Table,
        filter: Option<RowFilter>,
    ) -> bool {
        let mut connections = self.inner.connections.write().await;
        match connections.get_mut(&conn_id) {
            Some(entry) => {
                entry
                    .subscriptions
                    .insert(subscription_id, Subscription { table, filter });
                true
            }
            None => false,
        }
    }

    /// Remove a subscription. Returns whether it existed.
    pub async fn unsubscribe(&self, conn_id: Uuid, subscription_id: &str) -> bool {
        let mut connections = self.inner.connections.write().await;
        connections
            .get_mut(&conn_id)
            .is_some_and(|entry| entry.subscriptions.remove(subscription_id).is_some())
    }

    #[cfg(test)]
    pub async fn subscription_count(&self, conn_id: Uuid) -> usize {
        self.inner
            .connections
            .read()
            .await
            .get(&conn_id)
            .map_or(0, |entry| entry.subscriptions.len())
    }

    /// Fan a committed row change out to every matching subscription whose
    /// connection belongs to a user in the change's audience.
    /// Returns the number of events queued.
    pub async fn publish(&self, change: TableChange) -> usize {
        let connections = self.inner.connections.read().await;
        let mut delivered = 0;

        for entry in connections.values() {
            if !change.audience.contains(&entry.user_id) {
                continue;
            }
            for (subscription_id, sub) in &entry.subscriptions {
                if sub.table != change.table || !change.matches(sub.filter.as_ref()) {
                    continue;
                }
                let event = GatewayEvent::Change {
                    subscription_id: subscription_id.clone(),
                    table: change.table,
                    kind: change.kind,
                    row_id: change.row_id,
                };
                if entry.tx.send(event).is_ok() {
                    delivered += 1;
                }
            }
        }

        trace!(
            "{:?} on {} ({}) delivered to {} subscriptions",
            change.kind, change.table, change.row_id, delivered
        );
        delivered
    }

    /// Register a user connection as online. Broadcasts presence on the first one.
    pub async fn user_online(&self, user_id: Uuid, username: String) {
        let first = {
            let mut online = self.inner.online_users.write().await;
            let entry = online.entry(user_id).or_insert_with(|| (username.clone(), 0));
            entry.1 += 1;
            entry.1 == 1
        };

        if first {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                username,
                online: true,
            });
        }
    }

    /// Tear down a connection. Broadcasts offline once the user's last one closes.
    pub async fn user_offline(&self, user_id: Uuid, conn_id: Uuid) {
        self.unregister_connection(conn_id).await;

        let gone = {
            let mut online = self.inner.online_users.write().await;
            match online.get_mut(&user_id) {
                Some(entry) if entry.1 > 1 => {
                    entry.1 -= 1;
                    None
                }
                Some(_) => online.remove(&user_id).map(|(name, _)| name),
                None => None,
            }
        };

        if let Some(username) = gone {
            self.broadcast(GatewayEvent::PresenceUpdate {
                user_id,
                username,
                online: false,
            });
        }
    }

    /// Get list of online users.
    pub async fn online_users(&self) -> Vec<(Uuid, String)> {
        self.inner
            .online_users
            .read()
            .await
            .iter()
            .map(|(id, (name, _))| (*id, name.clone()))
            .collect()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.online_users.read().await.contains_key(&user_id)
    }
}
