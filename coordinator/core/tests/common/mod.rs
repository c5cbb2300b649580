// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scripted in-process transport and fixtures for the dispatch scenarios.
//!
//! Each [`FakeSession`] owns an unbounded event channel; tests push events
//! into it and script the result of each `send`. Every send is recorded with
//! the (virtual) instant it happened so timing can be asserted under
//! `start_paused` runtimes.

#![allow(dead_code)]

use async_trait::async_trait;
use chorus_core::application::{Coordinator, CoordinatorPorts, CoordinatorSettings};
use chorus_core::domain::agent::{Agent, AgentExit, AgentId, Credential};
use chorus_core::domain::clock::Clock;
use chorus_core::domain::events::DispatchEvent;
use chorus_core::domain::notifier::{AdminNotifier, NotifyError};
use chorus_core::domain::topic::{Topic, TopicId};
use chorus_core::domain::transport::{
    EventId, EventStream, IncomingEvent, MembershipStatus, SessionIdentity, TransportConnector,
    TransportError, TransportSession,
};
use chorus_core::infrastructure::repositories::{
    InMemoryAgentRepository, InMemoryRestrictionRepository, InMemoryTopicRepository,
};
use chorus_core::infrastructure::{EventBus, EventBusError, EventReceiver};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::UnboundedReceiverStream;

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub topic: TopicId,
    pub reply_to: EventId,
    pub text: String,
    pub at: Instant,
}

type EventItem = Result<IncomingEvent, TransportError>;

pub struct FakeSession {
    authorized: AtomicBool,
    identity: SessionIdentity,
    events_tx: Mutex<Option<mpsc::UnboundedSender<EventItem>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EventItem>>>,
    send_script: Mutex<VecDeque<Result<(), TransportError>>>,
    sends: Mutex<Vec<SentMessage>>,
    membership: Mutex<HashMap<TopicId, MembershipStatus>>,
    left: Mutex<Vec<TopicId>>,
    disconnected: AtomicBool,
}

impl FakeSession {
    pub fn new(first_name: &str) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            authorized: AtomicBool::new(true),
            identity: SessionIdentity {
                first_name: Some(first_name.to_string()),
                last_name: None,
            },
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
            send_script: Mutex::new(VecDeque::new()),
            sends: Mutex::new(Vec::new()),
            membership: Mutex::new(HashMap::new()),
            left: Mutex::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        })
    }

    pub fn emit(&self, event: IncomingEvent) {
        self.push(Ok(event));
    }

    pub fn emit_error(&self, error: TransportError) {
        self.push(Err(error));
    }

    fn push(&self, item: EventItem) {
        if let Some(tx) = self.events_tx.lock().as_ref() {
            let _ = tx.send(item);
        }
    }

    /// End the event stream, as a dropped connection would.
    pub fn close(&self) {
        self.events_tx.lock().take();
    }

    /// Result of the next `send`; unscripted sends succeed.
    pub fn script_send(&self, result: Result<(), TransportError>) {
        self.send_script.lock().push_back(result);
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    pub fn set_membership(&self, topic: TopicId, status: MembershipStatus) {
        self.membership.lock().insert(topic, status);
    }

    pub fn sends(&self) -> Vec<SentMessage> {
        self.sends.lock().clone()
    }

    pub fn left(&self) -> Vec<TopicId> {
        self.left.lock().clone()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransportSession for FakeSession {
    async fn is_authorized(&self) -> Result<bool, TransportError> {
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn identity(&self) -> Result<SessionIdentity, TransportError> {
        Ok(self.identity.clone())
    }

    async fn subscribe(&self) -> Result<EventStream, TransportError> {
        let rx = self
            .events_rx
            .lock()
            .take()
            .ok_or_else(|| TransportError::Other("already subscribed".to_string()))?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn send(&self, topic: TopicId, reply_to: EventId, text: &str) -> Result<(), TransportError> {
        self.sends.lock().push(SentMessage {
            topic,
            reply_to,
            text: text.to_string(),
            at: Instant::now(),
        });
        self.send_script.lock().pop_front().unwrap_or(Ok(()))
    }

    async fn topic_label(&self, topic: TopicId) -> Result<String, TransportError> {
        Ok(format!("Topic {}", topic))
    }

    async fn membership(&self, topic: TopicId) -> Result<MembershipStatus, TransportError> {
        Ok(self
            .membership
            .lock()
            .get(&topic)
            .copied()
            .unwrap_or(MembershipStatus::Member))
    }

    async fn leave(&self, topic: TopicId) -> Result<(), TransportError> {
        self.left.lock().push(topic);
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnected.store(true, Ordering::SeqCst);
    }
}

/// Hands out pre-registered sessions by credential.
#[derive(Default)]
pub struct FakeNetwork {
    sessions: Mutex<HashMap<String, Arc<FakeSession>>>,
}

impl FakeNetwork {
    pub fn register(&self, credential: &str, session: Arc<FakeSession>) {
        self.sessions.lock().insert(credential.to_string(), session);
    }
}

#[async_trait]
impl TransportConnector for FakeNetwork {
    async fn connect(&self, credential: &Credential) -> Result<Arc<dyn TransportSession>, TransportError> {
        let session = self
            .sessions
            .lock()
            .get(credential.expose())
            .cloned()
            .ok_or_else(|| TransportError::Auth("unknown credential".to_string()))?;
        Ok(session)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    texts: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }
}

#[async_trait]
impl AdminNotifier for RecordingNotifier {
    async fn notify(&self, text: &str) -> Result<(), NotifyError> {
        self.texts.lock().push(text.to_string());
        Ok(())
    }
}

/// Wall clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

pub struct Harness {
    pub agents: InMemoryAgentRepository,
    pub topics: InMemoryTopicRepository,
    pub restrictions: InMemoryRestrictionRepository,
    pub network: Arc<FakeNetwork>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
    pub event_bus: EventBus,
}

impl Harness {
    pub fn new() -> Self {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Self {
            agents: InMemoryAgentRepository::new(),
            topics: InMemoryTopicRepository::new(),
            restrictions: InMemoryRestrictionRepository::new(),
            network: Arc::new(FakeNetwork::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: Arc::new(ManualClock::new(start)),
            event_bus: EventBus::new(4096),
        }
    }

    pub fn add_topic(&self, id: i64, texts: &[&str]) {
        self.topics.add_topic(Topic {
            id: TopicId(id),
            display_name: Some(format!("topic-{id}")),
            active: true,
        });
        for text in texts {
            self.topics.add_response(TopicId(id), *text);
        }
    }

    /// Register an active agent with a connected, authorized session.
    pub fn add_agent(&self, id: i64, name: &str) -> Arc<FakeSession> {
        let credential = format!("cred-{id}");
        self.agents
            .register(Agent::new(AgentId(id), Credential::new(credential.clone())).with_display_name(name));
        let session = FakeSession::new(name);
        self.network.register(&credential, session.clone());
        session
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        let ports = CoordinatorPorts {
            agents: Arc::new(self.agents.clone()),
            topics: Arc::new(self.topics.clone()),
            restrictions: Arc::new(self.restrictions.clone()),
            connector: self.network.clone(),
            notifier: self.notifier.clone(),
        };
        Arc::new(
            Coordinator::new(ports, CoordinatorSettings::default())
                .with_clock(self.clock.clone())
                .with_event_bus(self.event_bus.clone()),
        )
    }

    /// Start a coordinator in the background.
    pub fn start(&self) -> (Arc<Coordinator>, JoinHandle<anyhow::Result<Vec<(AgentId, AgentExit)>>>) {
        let coordinator = self.coordinator();
        let handle = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.run().await }
        });
        (coordinator, handle)
    }
}

pub fn event(id: i64, topic: i64) -> IncomingEvent {
    IncomingEvent {
        id: EventId(id),
        topic_id: TopicId(topic),
        timestamp: Utc::now(),
    }
}

/// Deliver `event` to every session, as the shared stream would.
pub fn broadcast(sessions: &[Arc<FakeSession>], event: IncomingEvent) {
    for session in sessions {
        session.emit(event.clone());
    }
}

/// Next event on the bus matching `predicate`; panics after five virtual minutes.
pub async fn next_matching<F>(receiver: &mut EventReceiver, mut predicate: F) -> DispatchEvent
where
    F: FnMut(&DispatchEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(300), async {
        loop {
            match receiver.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(EventBusError::Lagged(_)) => continue,
                Err(e) => panic!("event bus failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for dispatch event")
}

/// Let spawned background work (notifications) run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
