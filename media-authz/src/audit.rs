//! Authorization audit trail.
//!
//! Every terminal decision of the pipeline produces one [`AuditEvent`]. Sinks
//! must not block the request path; slow consumers sit behind a
//! [`ChannelAuditSink`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::acl::{permissions_string, Permission, Resource, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Granted,
    Denied,
    Error,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Granted => "granted",
            AuditOutcome::Denied => "denied",
            AuditOutcome::Error => "error",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authorization decision. Never carries the raw token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub level: AuditLevel,
    pub outcome: AuditOutcome,
    pub client_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub action: String,
    pub resource: Resource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    pub message: String,
}

impl AuditEvent {
    pub fn new(
        level: AuditLevel,
        outcome: AuditOutcome,
        client_ip: impl Into<String>,
        resource: Resource,
        perms: &[Permission],
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            outcome,
            client_ip: client_ip.into(),
            request_id: None,
            ref_id: None,
            subject: None,
            action: permissions_string(perms),
            resource,
            role: None,
            message: message.into(),
        }
    }

    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.request_id = request_id.map(str::to_string);
        self
    }

    pub fn with_ref_id(mut self, ref_id: &str) -> Self {
        self.ref_id = Some(ref_id.to_string()).filter(|s| !s.is_empty());
        self
    }

    pub fn with_subject(mut self, subject: Option<String>) -> Self {
        self.subject = subject;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.client_ip)?;
        if let Some(ref_id) = &self.ref_id {
            write!(f, " session {}", ref_id)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, " {}", subject)?;
        }
        write!(f, " {} {}", self.action, self.resource)?;
        if let Some(role) = &self.role {
            write!(f, " as {}", role)?;
        }
        write!(f, ": {} ({})", self.message, self.outcome)
    }
}

/// Receives audit events. `emit` runs on the request path and must return
/// promptly.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Writes events to the `audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        let role = event.role.map(|r| r.as_str()).unwrap_or_default();
        let ref_id = event.ref_id.as_deref().unwrap_or_default();
        let request_id = event.request_id.as_deref().unwrap_or_default();

        match event.level {
            AuditLevel::Info => tracing::info!(
                target: "audit",
                outcome = event.outcome.as_str(),
                client_ip = %event.client_ip,
                resource = event.resource.as_str(),
                action = %event.action,
                role,
                ref_id,
                request_id,
                "{}",
                event
            ),
            AuditLevel::Warn => tracing::warn!(
                target: "audit",
                outcome = event.outcome.as_str(),
                client_ip = %event.client_ip,
                resource = event.resource.as_str(),
                action = %event.action,
                role,
                ref_id,
                request_id,
                "{}",
                event
            ),
            AuditLevel::Error => tracing::error!(
                target: "audit",
                outcome = event.outcome.as_str(),
                client_ip = %event.client_ip,
                resource = event.resource.as_str(),
                action = %event.action,
                role,
                ref_id,
                request_id,
                "{}",
                event
            ),
        }
    }
}

/// Hands events to a background task over a bounded channel. Events are
/// dropped with a warning when the channel is full.
#[derive(Clone)]
pub struct ChannelAuditSink {
    tx: mpsc::Sender<AuditEvent>,
}

impl ChannelAuditSink {
    /// Spawn the forwarding task. Must be called within a Tokio runtime.
    pub fn spawn(capacity: usize, inner: Arc<dyn AuditSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<AuditEvent>(capacity.max(1));
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                inner.emit(event);
            }
        });
        (Self { tx }, handle)
    }
}

impl AuditSink for ChannelAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    tracing::warn!(client_ip = %event.client_ip, "Audit channel full, event dropped");
                }
                mpsc::error::TrySendError::Closed(event) => {
                    tracing::warn!(client_ip = %event.client_ip, "Audit channel closed, event dropped");
                }
            }
        }
    }
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<AuditEvent> {
        self.events.lock().ok().and_then(|e| e.last().cloned())
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
