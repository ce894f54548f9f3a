//! Live UTXO view over a push subscription.
//!
//! A [`UtxoStreamManager`] is a handle to a background task. The task owns
//! the subscription state and is the only writer of it: the handle sends
//! commands, reads the published [`StreamStatus`], and receives
//! [`StreamEvent`]s on the channel returned by [`UtxoStreamManager::new`].
//!
//! ```text
//! Disconnected --subscribe--> Connecting --ack--> Connected
//! Connected --failure--> Reconnecting --ack--> Connected
//! Reconnecting --attempts exhausted--> Disconnected (terminal)
//! any --close--> Closed
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::node::{NotificationReceiver, TransportMessage, UtxoChangeSource};
use super::types::UtxosChangedNotification;
use crate::config::StreamConfig;
use crate::wallet::{validate_address, Address, Network, Outpoint, UtxoEntryReference};
use crate::{HoosatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

/// Snapshot of the subscription, republished on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: StreamState,
    pub reconnect_attempts: u32,
    pub last_error: Option<HoosatError>,
    pub addresses: Vec<Address>,
}

/// What one notification did to one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressChange {
    pub address: Address,
    pub added: Vec<UtxoEntryReference>,
    pub removed: Vec<UtxoEntryReference>,
}

impl AddressChange {
    fn new(address: Address) -> Self {
        Self {
            address,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Every address touched by one notification, in order of first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UtxoChangeSet {
    pub changes: Vec<AddressChange>,
}

impl UtxoChangeSet {
    pub fn added_count(&self) -> usize {
        self.changes.iter().map(|c| c.added.len()).sum()
    }

    pub fn removed_count(&self) -> usize {
        self.changes.iter().map(|c| c.removed.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    StateChanged(StreamState),
    AddressUtxosChanged(AddressChange),
    UtxosChanged(UtxoChangeSet),
    /// The connection failed; a reconnect is scheduled unless attempts ran out.
    TransportError(HoosatError),
    /// A notification could not be decoded. The connection is kept.
    NotificationRejected(HoosatError),
    /// Terminal. Emitted once, after the last failed attempt.
    MaxReconnectAttemptsReached { attempts: u32 },
}

type UtxoView = Arc<RwLock<HashMap<Address, HashMap<Outpoint, UtxoEntryReference>>>>;

enum Command {
    Subscribe(Vec<Address>, oneshot::Sender<Result<()>>),
    Unsubscribe(Vec<Address>, oneshot::Sender<Result<()>>),
    Close,
}

fn closed_error() -> HoosatError {
    HoosatError::StreamTransportError("stream manager closed".to_string())
}

pub struct UtxoStreamManager {
    network: Network,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<StreamStatus>,
    view: UtxoView,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl UtxoStreamManager {
    /// Spawn the manager task on the current tokio runtime. Nothing is
    /// subscribed until the first [`subscribe`](Self::subscribe).
    pub fn new(
        source: Arc<dyn UtxoChangeSource>,
        network: Network,
        config: StreamConfig,
    ) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let subscription = StreamSubscription::default();
        let (status_tx, status_rx) = watch::channel(subscription.status());
        let view = UtxoView::default();

        let task = StreamTask {
            source,
            config,
            subscription,
            receiver: None,
            retry_at: None,
            exhausted: false,
            commands: command_rx,
            events: event_tx,
            status: status_tx,
            view: Arc::clone(&view),
        };
        let handle = tokio::spawn(task.run());

        let manager = Self {
            network,
            commands: command_tx,
            status: status_rx,
            view,
            task: Mutex::new(Some(handle)),
        };
        (manager, event_rx)
    }

    /// Add addresses to the subscription. Every address must be valid for
    /// this manager's network, and the total may not exceed
    /// `max_subscribed_addresses`.
    pub async fn subscribe<S: AsRef<str>>(&self, addresses: &[S]) -> Result<()> {
        let addresses = self.parse_addresses(addresses)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Subscribe(addresses, reply_tx))
            .map_err(|_| closed_error())?;
        reply_rx.await.map_err(|_| closed_error())?
    }

    /// Drop addresses from the subscription. Later notifications for them
    /// are ignored. Addresses that were never subscribed are ignored too.
    pub async fn unsubscribe<S: AsRef<str>>(&self, addresses: &[S]) -> Result<()> {
        let addresses = self.parse_addresses(addresses)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(Command::Unsubscribe(addresses, reply_tx))
            .map_err(|_| closed_error())?;
        reply_rx.await.map_err(|_| closed_error())?
    }

    /// Stop the task and wait for it. The last event is
    /// `StateChanged(Closed)`.
    pub async fn close(&self) -> Result<()> {
        let handle = self.task.lock().take();
        let Some(handle) = handle else {
            return Err(closed_error());
        };
        // The task may already be gone if it panicked; the join reports that.
        let _ = self.commands.send(Command::Close);
        handle
            .await
            .map_err(|e| HoosatError::StreamTransportError(e.to_string()))
    }

    pub fn status(&self) -> StreamStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> StreamState {
        self.status.borrow().state
    }

    /// A receiver that observes every status change.
    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }

    /// Current known unspent outputs of `address`, ordered by outpoint.
    pub fn utxos(&self, address: &Address) -> Vec<UtxoEntryReference> {
        let view = self.view.read();
        let mut utxos: Vec<UtxoEntryReference> = view
            .get(address)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default();
        utxos.sort_by_key(|u| u.outpoint);
        utxos
    }

    pub fn network(&self) -> Network {
        self.network
    }

    fn parse_addresses<S: AsRef<str>>(&self, addresses: &[S]) -> Result<Vec<Address>> {
        addresses
            .iter()
            .map(|a| validate_address(a.as_ref(), self.network))
            .collect()
    }
}

#[derive(Debug)]
struct StreamSubscription {
    addresses: Vec<Address>,
    state: StreamState,
    reconnect_attempts: u32,
    last_error: Option<HoosatError>,
}

impl Default for StreamSubscription {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            state: StreamState::Disconnected,
            reconnect_attempts: 0,
            last_error: None,
        }
    }
}

impl StreamSubscription {
    fn status(&self) -> StreamStatus {
        StreamStatus {
            state: self.state,
            reconnect_attempts: self.reconnect_attempts,
            last_error: self.last_error.clone(),
            addresses: self.addresses.clone(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

struct StreamTask {
    source: Arc<dyn UtxoChangeSource>,
    config: StreamConfig,
    subscription: StreamSubscription,
    receiver: Option<NotificationReceiver>,
    /// When the pending reconnect attempt may start.
    retry_at: Option<Instant>,
    exhausted: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<StreamEvent>,
    status: watch::Sender<StreamStatus>,
    view: UtxoView,
}

impl StreamTask {
    async fn run(mut self) {
        loop {
            let flow = match self.subscription.state {
                StreamState::Disconnected => {
                    let command = self.commands.recv().await;
                    self.handle_command(command)
                }
                StreamState::Connecting | StreamState::Reconnecting => self.connect().await,
                StreamState::Connected => self.listen().await,
                StreamState::Closed => Flow::Stop,
            };
            if flow == Flow::Stop {
                break;
            }
        }
        debug!("stream task finished");
    }

    async fn connect(&mut self) -> Flow {
        if let Some(deadline) = self.retry_at {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                command = self.commands.recv() => return self.handle_command(command),
            }
            self.retry_at = None;
        }

        let source = Arc::clone(&self.source);
        let addresses = self.subscription.addresses.clone();
        debug!(
            addresses = addresses.len(),
            attempt = self.subscription.reconnect_attempts,
            "subscribing to utxo changes"
        );
        let result = tokio::select! {
            result = source.subscribe_utxo_changes(&addresses) => result,
            command = self.commands.recv() => return self.handle_command(command),
        };

        match result {
            Ok(receiver) => {
                self.receiver = Some(receiver);
                self.subscription.reconnect_attempts = 0;
                self.set_state(StreamState::Connected);
            }
            Err(e) => self.on_connection_failure(e),
        }
        Flow::Continue
    }

    async fn listen(&mut self) -> Flow {
        let Some(receiver) = self.receiver.as_mut() else {
            self.on_connection_failure(HoosatError::StreamTransportError(
                "no notification channel".to_string(),
            ));
            return Flow::Continue;
        };
        let message = tokio::select! {
            message = receiver.recv() => message,
            command = self.commands.recv() => return self.handle_command(command),
        };

        match message {
            Some(TransportMessage::Notification(raw)) => match UtxosChangedNotification::parse(&raw) {
                Ok(notification) => self.apply(notification),
                Err(e) => {
                    warn!(error = %e, "rejected utxo notification");
                    self.emit(StreamEvent::NotificationRejected(e));
                }
            },
            Some(TransportMessage::Error(reason)) => {
                self.on_connection_failure(HoosatError::StreamTransportError(reason))
            }
            None => self.on_connection_failure(HoosatError::StreamTransportError(
                "notification channel closed".to_string(),
            )),
        }
        Flow::Continue
    }

    fn handle_command(&mut self, command: Option<Command>) -> Flow {
        match command {
            Some(Command::Subscribe(addresses, reply)) => {
                let result = self.add_addresses(addresses);
                let _ = reply.send(result);
                Flow::Continue
            }
            Some(Command::Unsubscribe(addresses, reply)) => {
                self.remove_addresses(&addresses);
                let _ = reply.send(Ok(()));
                Flow::Continue
            }
            Some(Command::Close) => {
                self.receiver = None;
                self.set_state(StreamState::Closed);
                Flow::Stop
            }
            // Every handle is gone.
            None => Flow::Stop,
        }
    }

    fn add_addresses(&mut self, addresses: Vec<Address>) -> Result<()> {
        if self.exhausted {
            return Err(HoosatError::MaxReconnectAttemptsReached(
                self.subscription.reconnect_attempts,
            ));
        }

        let mut new_addresses: Vec<Address> = Vec::new();
        for address in addresses {
            if !self.subscription.addresses.contains(&address) && !new_addresses.contains(&address) {
                new_addresses.push(address);
            }
        }
        if new_addresses.is_empty() {
            return Ok(());
        }

        let requested = self.subscription.addresses.len() + new_addresses.len();
        if requested > self.config.max_subscribed_addresses {
            return Err(HoosatError::SubscriptionLimitExceeded {
                requested,
                limit: self.config.max_subscribed_addresses,
            });
        }

        {
            let mut view = self.view.write();
            for address in &new_addresses {
                view.entry(address.clone()).or_default();
            }
        }
        self.subscription.addresses.extend(new_addresses);
        info!(total = requested, "utxo subscription extended");

        match self.subscription.state {
            StreamState::Disconnected | StreamState::Connected => {
                // A live subscription is re-issued with the full set.
                self.receiver = None;
                self.set_state(StreamState::Connecting);
            }
            // An attempt in flight picks the new set up when it (re)starts.
            StreamState::Connecting | StreamState::Reconnecting | StreamState::Closed => {
                self.publish();
            }
        }
        Ok(())
    }

    fn remove_addresses(&mut self, addresses: &[Address]) {
        self.subscription.addresses.retain(|a| !addresses.contains(a));
        {
            let mut view = self.view.write();
            for address in addresses {
                view.remove(address);
            }
        }
        if self.subscription.addresses.is_empty() && !self.exhausted {
            self.receiver = None;
            self.retry_at = None;
            self.subscription.reconnect_attempts = 0;
            self.set_state(StreamState::Disconnected);
        } else {
            self.publish();
        }
    }

    fn on_connection_failure(&mut self, error: HoosatError) {
        self.receiver = None;
        self.subscription.last_error = Some(error.clone());
        self.emit(StreamEvent::TransportError(error.clone()));

        let attempts = self.subscription.reconnect_attempts;
        if attempts >= self.config.max_reconnect_attempts {
            warn!(attempts, error = %error, "giving up on utxo stream");
            self.exhausted = true;
            self.set_state(StreamState::Disconnected);
            self.emit(StreamEvent::MaxReconnectAttemptsReached { attempts });
            return;
        }

        let attempt = attempts + 1;
        let delay = self.config.reconnect_delay(attempt);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "utxo stream lost, reconnecting"
        );
        self.subscription.reconnect_attempts = attempt;
        self.retry_at = Some(Instant::now() + delay);
        self.set_state(StreamState::Reconnecting);
    }

    fn apply(&mut self, notification: UtxosChangedNotification) {
        let mut changes: Vec<AddressChange> = Vec::new();
        let mut index: HashMap<Address, usize> = HashMap::new();

        {
            let mut view = self.view.write();
            let tagged = notification
                .added
                .into_iter()
                .map(|u| (u, true))
                .chain(notification.removed.into_iter().map(|u| (u, false)));

            for (utxo, is_added) in tagged {
                let Some(address) = utxo.address.clone() else {
                    debug!(outpoint = %utxo.outpoint, "utxo change without address dropped");
                    continue;
                };
                let Some(known) = view.get_mut(&address) else {
                    debug!(address = %address, "change for unsubscribed address dropped");
                    continue;
                };

                let slot = *index.entry(address.clone()).or_insert_with(|| {
                    changes.push(AddressChange::new(address.clone()));
                    changes.len() - 1
                });

                if is_added {
                    if known.contains_key(&utxo.outpoint) {
                        debug!(outpoint = %utxo.outpoint, "duplicate utxo suppressed");
                        continue;
                    }
                    known.insert(utxo.outpoint, utxo.clone());
                    changes[slot].added.push(utxo);
                } else {
                    known.remove(&utxo.outpoint);
                    changes[slot].removed.push(utxo);
                }
            }
        }

        changes.retain(|c| !c.is_empty());
        if changes.is_empty() {
            return;
        }
        for change in &changes {
            self.emit(StreamEvent::AddressUtxosChanged(change.clone()));
        }
        let change_set = UtxoChangeSet { changes };
        debug!(
            added = change_set.added_count(),
            removed = change_set.removed_count(),
            "applied utxo changes"
        );
        self.emit(StreamEvent::UtxosChanged(change_set));
    }

    fn set_state(&mut self, state: StreamState) {
        if self.subscription.state != state {
            info!(from = ?self.subscription.state, to = ?state, "stream state changed");
            self.subscription.state = state;
            self.emit(StreamEvent::StateChanged(state));
        }
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.subscription.status());
    }

    fn emit(&self, event: StreamEvent) {
        // Nobody listening is fine; the view and status still update.
        let _ = self.events.send(event);
    }
}
