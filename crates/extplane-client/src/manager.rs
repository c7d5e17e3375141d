//! Subscription manager
//!
//! The synchronous state machine behind the client. It tracks which
//! datarefs are registered, queued for registration or being unregistered,
//! and serializes `sub` commands so only one is awaiting acknowledgment at a
//! time. The server has no explicit acknowledgment: the first value pushed
//! for the in-flight dataref counts as one.
//!
//! The manager performs no I/O. Commands to send are buffered and collected
//! with [`SubscriptionManager::take_outbound`]; events are collected with
//! [`SubscriptionManager::drain_events`]. The owner must serialize all calls,
//! which the client actor does by owning the manager outright.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use extplane_protocol::{
    Command, Dataref, DatarefId, DatarefValue, DecodeError, Output, UpdateInterval,
};
use tracing::{debug, info, warn};

use crate::events::ClientEvent;
use crate::state::{InFlight, SubscriptionSnapshot, SubscriptionState};

/// The subscription state machine
pub struct SubscriptionManager {
    update_interval: Option<UpdateInterval>,
    connected: bool,
    registered: HashMap<DatarefId, Dataref>,
    pending_registration: VecDeque<Dataref>,
    pending_unregistration: HashMap<DatarefId, Dataref>,
    in_flight: Option<InFlight>,
    outbound: Vec<Command>,
    event_buffer: Vec<ClientEvent>,
}

impl SubscriptionManager {
    /// Create a manager that sends no update interval setting
    pub fn new() -> Self {
        Self::with_update_interval(None)
    }

    /// Create a manager that sends `update_interval` on every connect
    pub fn with_update_interval(update_interval: Option<UpdateInterval>) -> Self {
        Self {
            update_interval,
            connected: false,
            registered: HashMap::new(),
            pending_registration: VecDeque::new(),
            pending_unregistration: HashMap::new(),
            in_flight: None,
            outbound: Vec::new(),
            event_buffer: Vec::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Lifecycle state of a dataref
    pub fn state(&self, id: &DatarefId) -> SubscriptionState {
        if self.pending_unregistration.contains_key(id) {
            SubscriptionState::PendingUnregistration
        } else if self.registered.contains_key(id) {
            SubscriptionState::Registered
        } else if self.is_pending(id) {
            SubscriptionState::PendingRegistration
        } else {
            SubscriptionState::Unregistered
        }
    }

    fn is_pending(&self, id: &DatarefId) -> bool {
        self.in_flight.as_ref().is_some_and(|f| f.id() == id)
            || self.pending_registration.iter().any(|d| d.id() == id)
    }

    /// Request a subscription
    ///
    /// Returns `false` if the dataref is already registered or pending.
    /// Otherwise it is queued and, when connected with nothing in flight,
    /// its `sub` is sent immediately.
    pub fn register(&mut self, dataref: Dataref) -> bool {
        let id = dataref.id();
        if self.registered.contains_key(id) || self.is_pending(id) {
            debug!("Dataref {} already registered or pending", id);
            return false;
        }

        info!("Queueing subscription for {}", id);
        self.pending_registration.push_back(dataref);
        self.start_next_registration();
        true
    }

    /// Remove a registered subscription
    ///
    /// Returns `false` (and sends nothing) unless the dataref is registered.
    /// The protocol never acknowledges `unsub`, so the dataref passes through
    /// the pending-unregistration set and is dropped before this returns;
    /// callers see it go straight from `Registered` to `Unregistered`.
    pub fn unregister(&mut self, id: &DatarefId) -> bool {
        let Some(dataref) = self.registered.get(id).cloned() else {
            debug!("Ignoring unregister for {}: not registered", id);
            return false;
        };

        self.pending_unregistration
            .insert(id.clone(), dataref.clone());

        if self.connected {
            self.outbound.push(Command::unsubscribe(dataref.clone()));
        } else {
            debug!("Not connected; dropping {} locally only", id);
        }

        self.pending_unregistration.remove(id);
        self.registered.remove(id);

        info!("Unsubscribed {}", id);
        self.event_buffer
            .push(ClientEvent::Unsubscribed { dataref });
        true
    }

    /// Queue an arbitrary command
    ///
    /// Returns `false` if no transport is connected. Use [`register`] and
    /// [`unregister`] for subscriptions so the sets stay consistent.
    ///
    /// [`register`]: SubscriptionManager::register
    /// [`unregister`]: SubscriptionManager::unregister
    pub fn send(&mut self, command: Command) -> bool {
        if !self.connected {
            warn!("Cannot send {:?}: not connected", command.encode());
            return false;
        }
        self.outbound.push(command);
        true
    }

    /// The transport connected
    ///
    /// Sends the update interval setting if configured, re-sends `sub` for
    /// every registered dataref, then restarts the pending queue.
    pub fn on_connected(&mut self) {
        self.connected = true;
        self.requeue_in_flight();

        if let Some(interval) = self.update_interval {
            self.outbound.push(Command::update_interval(interval));
        }

        let mut replay: Vec<&Dataref> = self.registered.values().collect();
        replay.sort_by(|a, b| a.id().cmp(b.id()));
        for dataref in replay {
            self.outbound.push(Command::subscribe(dataref.clone()));
        }

        info!(
            "Connected: replaying {} subscriptions, {} pending",
            self.registered.len(),
            self.pending_registration.len()
        );
        self.event_buffer.push(ClientEvent::Connected);
        self.start_next_registration();
    }

    /// The transport disconnected
    ///
    /// Membership of the registered and pending sets survives so the next
    /// connect can replay them.
    pub fn on_disconnected(&mut self, reason: Option<String>) {
        self.connected = false;
        self.requeue_in_flight();
        self.outbound.clear();

        info!(
            "Disconnected ({}): {} registered, {} pending",
            reason.as_deref().unwrap_or("no reason given"),
            self.registered.len(),
            self.pending_registration.len()
        );
        self.event_buffer.push(ClientEvent::Disconnected { reason });
    }

    /// Decode and apply one line from the server
    ///
    /// A line that fails to decode is reported as an event and returned as
    /// an error; state is left untouched.
    pub fn handle_line(&mut self, line: &str) -> Result<(), DecodeError> {
        match Output::decode(line) {
            Ok(output) => {
                self.handle_output(output);
                Ok(())
            }
            Err(error) => {
                warn!("Failed to decode line {:?}: {}", line, error);
                self.event_buffer.push(ClientEvent::DecodeFailed {
                    line: line.to_string(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Apply one decoded server output
    pub fn handle_output(&mut self, output: Output) {
        match output {
            Output::Connected => {
                info!("Server greeting received");
                self.event_buffer.push(ClientEvent::ServerGreeting);
            }
            Output::ValueChanged(decoded, value) => self.handle_value(decoded, value),
        }
    }

    fn handle_value(&mut self, decoded: Dataref, value: DatarefValue) {
        let id = decoded.id();

        // First value for the in-flight dataref acknowledges its `sub`
        if self.in_flight.as_ref().is_some_and(|f| f.id() == id) {
            if let Some(flight) = self.in_flight.take() {
                let mut dataref = flight.dataref;
                store_value(&mut dataref, value);
                info!(
                    "Subscription to {} acknowledged after {:?}",
                    id,
                    flight.since.elapsed()
                );
                self.registered.insert(id.clone(), dataref.clone());
                self.event_buffer.push(ClientEvent::Subscribed {
                    dataref: dataref.clone(),
                });
                self.event_buffer.push(ClientEvent::ValueChanged { dataref });
                self.start_next_registration();
            }
            return;
        }

        if let Some(stored) = self.registered.get_mut(id) {
            store_value(stored, value);
            self.event_buffer.push(ClientEvent::ValueChanged {
                dataref: stored.clone(),
            });
        } else {
            debug!("Ignoring value for {}: not subscribed", id);
        }
    }

    /// Report the in-flight subscription once it has waited past `threshold`
    ///
    /// Returns `true` if a stall event was emitted. Each in-flight attempt
    /// is reported at most once.
    pub fn check_stalled(&mut self, threshold: Duration) -> bool {
        let Some(flight) = self.in_flight.as_mut() else {
            return false;
        };

        let elapsed = flight.since.elapsed();
        if flight.stall_reported || elapsed < threshold {
            return false;
        }

        flight.stall_reported = true;
        warn!(
            "Subscription to {} has had no value for {:?}",
            flight.id(),
            elapsed
        );
        self.event_buffer.push(ClientEvent::RegistrationStalled {
            dataref: flight.dataref.clone(),
            elapsed_ms: elapsed.as_millis() as u64,
        });
        true
    }

    /// How long the in-flight subscription has been waiting
    pub fn in_flight_age(&self) -> Option<Duration> {
        self.in_flight.as_ref().map(|f| f.since.elapsed())
    }

    pub fn in_flight(&self) -> Option<&Dataref> {
        self.in_flight.as_ref().map(|f| &f.dataref)
    }

    /// Get a registered dataref, with its last value
    pub fn get(&self, id: &DatarefId) -> Option<&Dataref> {
        self.registered.get(id)
    }

    /// Last value of a registered dataref
    pub fn value(&self, id: &DatarefId) -> Option<&DatarefValue> {
        self.registered.get(id).and_then(|d| d.value())
    }

    /// Iterate over registered datarefs
    pub fn registered(&self) -> impl Iterator<Item = &Dataref> {
        self.registered.values()
    }

    /// Iterate over pending datarefs, in-flight first, then in service order
    pub fn pending_registration(&self) -> impl Iterator<Item = &Dataref> {
        self.in_flight
            .iter()
            .map(|f| &f.dataref)
            .chain(self.pending_registration.iter())
    }

    /// Copy the subscription sets
    pub fn snapshot(&self) -> SubscriptionSnapshot {
        let mut registered: Vec<Dataref> = self.registered.values().cloned().collect();
        registered.sort_by(|a, b| a.id().cmp(b.id()));

        SubscriptionSnapshot {
            registered,
            pending_registration: self.pending_registration().cloned().collect(),
            pending_unregistration: self.pending_unregistration.values().cloned().collect(),
            in_flight: self.in_flight().cloned(),
        }
    }

    /// Take the commands queued for the transport, in send order
    pub fn take_outbound(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.outbound)
    }

    /// Drain buffered events
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.event_buffer)
    }

    /// Send `sub` for the oldest pending dataref if connected and idle
    fn start_next_registration(&mut self) {
        if !self.connected || self.in_flight.is_some() {
            return;
        }

        if let Some(dataref) = self.pending_registration.pop_front() {
            debug!("Subscribing to {}", dataref.id());
            self.outbound.push(Command::subscribe(dataref.clone()));
            self.in_flight = Some(InFlight::new(dataref));
        }
    }

    /// Return an interrupted in-flight dataref to the head of the queue
    fn requeue_in_flight(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            debug!("Requeueing in-flight subscription for {}", flight.id());
            self.pending_registration.push_front(flight.dataref);
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn store_value(dataref: &mut Dataref, value: DatarefValue) {
    if let Err(e) = dataref.set_value(value) {
        warn!("Dropping value for {}: {}", dataref.id(), e);
    }
}
