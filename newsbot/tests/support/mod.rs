// Shared fakes for pipeline, command and server tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use newsbot::llm::{CompletionClient, CompletionRequest};
use newsbot::report::Payload;
use newsbot::sink::{Destination, Invoker, NotificationSink};

/// Returns scripted completions in order; `None` entries (or an exhausted script) fail.
pub struct ScriptedClient {
    responses: Mutex<VecDeque<Option<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new(responses: Vec<Option<&str>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(str::to_string)).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, request: CompletionRequest) -> Option<String> {
        self.requests.lock().unwrap().push(request);
        self.responses.lock().unwrap().pop_front().flatten()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(String),
    Payload(Payload),
}

/// In-memory sink that records every delivered message.
pub struct RecordingSink {
    resolvable: bool,
    fail_payloads: bool,
    sent: Mutex<Vec<Sent>>,
    delivered: Notify,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Self::build(true, false)
    }

    pub fn unresolvable() -> Arc<Self> {
        Self::build(false, false)
    }

    /// Resolves, accepts text, but rejects structured payloads.
    pub fn rejecting_payloads() -> Arc<Self> {
        Self::build(true, true)
    }

    fn build(resolvable: bool, fail_payloads: bool) -> Arc<Self> {
        Arc::new(Self {
            resolvable,
            fail_payloads,
            sent: Mutex::new(Vec::new()),
            delivered: Notify::new(),
        })
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Resolves once a message has been recorded since the last call.
    pub async fn wait_for_message(&self) {
        self.delivered.notified().await
    }

    fn record(&self, message: Sent) {
        self.sent.lock().unwrap().push(message);
        self.delivered.notify_one();
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn resolve(&self) -> Option<Destination> {
        self.resolvable.then(|| Destination {
            id: "1234".to_string(),
        })
    }

    async fn send_text(&self, _destination: &Destination, text: &str) -> anyhow::Result<()> {
        self.record(Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_payload(&self, _destination: &Destination, payload: &Payload) -> anyhow::Result<()> {
        if self.fail_payloads {
            anyhow::bail!("Discord API error 400 Bad Request: embed too large");
        }
        self.record(Sent::Payload(payload.clone()));
        Ok(())
    }

    fn has_admin(&self, invoker: &Invoker) -> bool {
        invoker.permissions & 0x8 != 0
    }

    fn destination_ref(&self) -> String {
        "<#1234>".to_string()
    }
}

pub fn admin() -> Invoker {
    Invoker {
        user_id: "100".to_string(),
        permissions: 0x8,
    }
}

pub fn member() -> Invoker {
    Invoker {
        user_id: "200".to_string(),
        permissions: 0x400,
    }
}
