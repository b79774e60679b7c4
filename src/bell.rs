//! The live notification-bell feed.
//!
//! A single task owns the set of connected dashboard WebSocket clients and
//! pushes the urgent summary to all of them whenever it changes. A watcher
//! listens on the gateway change feed and recomputes the summary from fresh
//! snapshots. The feed never patches state incrementally, so a lost event
//! only delays an update until the next one.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use metrics::{counter, gauge};
use rand::Rng as _;
use tracing::{debug, error, warn};

use crate::admin_config::{ConfigStore, ADMIN_CONFIG_COLLECTION};
use crate::gateway::{fetch_all_as, Gateway};
use crate::metrics::{BELL_LISTENERS, BELL_UPDATES};
use crate::models::{Announcement, Post, ANNOUNCEMENT_COLLECTION, POST_COLLECTION};
use crate::moderation::notify::{urgent_summary, UrgentSummary};

enum BellMessage {
    Update(UrgentSummary),
    Connect(Box<WebSocket>),
}

/// Handle used to feed the bell task. Cheap to clone.
#[derive(Clone, Debug)]
pub(crate) struct BellProducer {
    tx: tokio::sync::mpsc::Sender<BellMessage>,
}

impl BellProducer {
    /// Push a freshly computed summary to every listener.
    pub(crate) async fn update(&self, summary: UrgentSummary) {
        drop(self.tx.send(BellMessage::Update(summary)).await);
    }

    /// Hand a newly upgraded dashboard WebSocket to the bell task.
    pub(crate) async fn client_connection(&self, ws: WebSocket) {
        drop(self.tx.send(BellMessage::Connect(Box::new(ws))).await);
    }
}

/// Send one message to all clients, dropping the ones that went away.
async fn broadcast_message(clients: &mut Vec<WebSocket>, msg: Message) {
    for i in (0..clients.len()).rev() {
        let client = clients.get_mut(i).expect("should find client");
        if let Err(e) = client.send(msg.clone()).await {
            debug!("bell client disconnected: {e}");
            drop(clients.remove(i));
        }
    }

    gauge!(BELL_LISTENERS).set(clients.len() as f64);
}

/// Spawn the bell fan-out task.
pub(crate) fn spawn() -> (tokio::task::JoinHandle<()>, BellProducer) {
    let (tx, mut rx) = tokio::sync::mpsc::channel(1000);
    let handle = tokio::spawn(async move {
        let mut clients: Vec<WebSocket> = Vec::new();
        let mut last: Option<UrgentSummary> = None;

        loop {
            match tokio::time::timeout(Duration::from_secs(30), rx.recv()).await {
                Ok(msg) => match msg {
                    Some(BellMessage::Update(summary)) => {
                        // Identical recomputations are not worth waking every
                        // dashboard for.
                        if last.as_ref() == Some(&summary) {
                            continue;
                        }

                        match serde_json::to_string(&summary) {
                            Ok(json) => {
                                counter!(BELL_UPDATES).increment(1);
                                broadcast_message(&mut clients, Message::Text(json.into())).await;
                                last = Some(summary);
                            }
                            Err(e) => error!("failed to serialize bell update: {e}"),
                        }
                    }
                    Some(BellMessage::Connect(ws)) => {
                        let mut ws = *ws;
                        // Bring the new listener up to date immediately.
                        if let Some(summary) = &last {
                            if let Ok(json) = serde_json::to_string(summary) {
                                if let Err(e) = ws.send(Message::Text(json.into())).await {
                                    debug!("bell client disconnected on connect: {e}");
                                    continue;
                                }
                            }
                        }
                        clients.push(ws);
                        gauge!(BELL_LISTENERS).set(clients.len() as f64);
                    }
                    // All producers have been destroyed.
                    None => break,
                },
                Err(_) => {
                    let contents = rand::thread_rng()
                        .sample_iter(rand::distributions::Alphanumeric)
                        .take(15)
                        .map(char::from)
                        .collect::<String>();

                    // Keep idle connections alive with a websocket ping.
                    let message = Message::Ping(axum::body::Bytes::from_owner(contents));
                    broadcast_message(&mut clients, message).await;
                }
            }
        }
    });

    (handle, BellProducer { tx })
}

/// Recompute the urgent summary from fresh snapshots.
pub(crate) async fn compute_summary<G: Gateway>(
    gateway: &G,
    config_store: &ConfigStore<G>,
) -> Result<UrgentSummary> {
    let config = config_store.get().await?;
    let posts: Vec<Post> = fetch_all_as(gateway, POST_COLLECTION, &[]).await?;
    let announcements: Vec<Announcement> =
        fetch_all_as(gateway, ANNOUNCEMENT_COLLECTION, &[]).await?;
    Ok(urgent_summary(&posts, &announcements, &config, Utc::now()))
}

/// Watch the gateway change feed and keep the bell current. Runs until the
/// gateway is dropped.
pub(crate) async fn watch<G: Gateway>(
    gateway: Arc<G>,
    config_store: Arc<ConfigStore<G>>,
    producer: BellProducer,
) {
    let mut events = gateway.subscribe();

    // Prime listeners with the state at startup.
    match compute_summary(&*gateway, &config_store).await {
        Ok(summary) => producer.update(summary).await,
        Err(e) => warn!("failed to compute initial bell summary: {e:?}"),
    }

    loop {
        let relevant = match events.recv().await {
            Ok(event) => matches!(
                event.collection.as_str(),
                POST_COLLECTION | ANNOUNCEMENT_COLLECTION | ADMIN_CONFIG_COLLECTION
            ),
            // Missed events: resync from a fresh snapshot regardless.
            Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => true,
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };
        if !relevant {
            continue;
        }

        if let Err(e) = config_store.refresh().await {
            warn!("failed to refresh configuration for bell: {e:?}");
        }
        match compute_summary(&*gateway, &config_store).await {
            Ok(summary) => producer.update(summary).await,
            Err(e) => warn!("failed to recompute bell summary: {e:?}"),
        }
    }
}
