//! Scripted in-memory transport.
//!
//! Clones share state, so a test can keep one handle while the sender owns
//! another. Failures are queued up front and consumed in call order.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use postmail::{Transport, TransportError};

/// Call observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Authenticate(String),
    Transmit { from: String, to: Vec<String> },
    Close,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    messages: Vec<String>,
    open: bool,
    failing_connects: usize,
    failing_transmits: usize,
    reject_credentials: bool,
    failing_close: bool,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` connects fail.
    pub fn fail_connects(&self, count: usize) -> &Self {
        self.state.lock().unwrap().failing_connects = count;
        self
    }

    /// The next `count` transmits fail even on a healthy connection.
    pub fn fail_transmits(&self, count: usize) -> &Self {
        self.state.lock().unwrap().failing_transmits = count;
        self
    }

    pub fn reject_credentials(&self) -> &Self {
        self.state.lock().unwrap().reject_credentials = true;
        self
    }

    pub fn fail_close(&self) -> &Self {
        self.state.lock().unwrap().failing_close = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Rendered messages from successful transmits.
    pub fn messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn connects(&self) -> usize {
        self.count(|call| matches!(call, Call::Connect(_)))
    }

    pub fn transmits(&self) -> usize {
        self.count(|call| matches!(call, Call::Transmit { .. }))
    }

    pub fn closes(&self) -> usize {
        self.count(|call| matches!(call, Call::Close))
    }

    /// Recipients of every transmit attempt, in order.
    pub fn envelopes(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Transmit { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|call| predicate(call)).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, host: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Connect(host.to_string()));

        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(TransportError::Connect {
                host: host.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        state.open = true;
        Ok(())
    }

    async fn authenticate(&mut self, address: &str, _credential: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Authenticate(address.to_string()));

        if !state.open {
            return Err(TransportError::NotConnected);
        }
        if state.reject_credentials {
            return Err(TransportError::Authentication(
                "535 5.7.8 Authentication credentials invalid".to_string(),
            ));
        }

        Ok(())
    }

    async fn transmit(&mut self, from: &str, to: &[String], message: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Transmit {
            from: from.to_string(),
            to: to.to_vec(),
        });

        if !state.open {
            return Err(TransportError::NotConnected);
        }
        if state.failing_transmits > 0 {
            state.failing_transmits -= 1;
            return Err(TransportError::Rejected {
                command: "DATA",
                code: 421,
                message: "4.4.2 Connection dropped".to_string(),
            });
        }

        state.messages.push(String::from_utf8(message.to_vec()).unwrap());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Close);
        state.open = false;

        if state.failing_close {
            return Err(TransportError::Timeout {
                step: "QUIT",
                after: std::time::Duration::from_secs(10),
            });
        }

        Ok(())
    }
}
