// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for push channel tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chime_core::{Frame, FrameType};
use tokio::sync::Notify;

use super::transport::{Endpoint, Transport, TransportError, TransportResult};

/// Something the mock server does on the next `recv()`.
#[derive(Debug, Clone)]
pub enum Incoming {
    Frame(Frame),
    /// The server closes the socket.
    Close,
    /// The socket breaks.
    Error(String),
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    incoming: VecDeque<Incoming>,
    outgoing: Vec<Frame>,
    /// Every connect fails while set.
    connect_fail: bool,
    /// The next n connects fail.
    fail_next: usize,
    connects: usize,
    endpoints: Vec<Endpoint>,
    /// Sends left before the socket breaks mid-write.
    sends_before_break: Option<usize>,
}

/// Mock transport for testing without real sockets.
///
/// Clones share state, so a test can keep one while the session owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    wake: Arc<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame that will be returned by recv().
    pub fn queue_incoming(&self, frame: Frame) {
        self.push(Incoming::Frame(frame));
    }

    /// Make the server close the connection after the queued frames.
    pub fn close_remote(&self) {
        self.push(Incoming::Close);
    }

    pub fn break_connection(&self, reason: &str) {
        self.push(Incoming::Error(reason.to_string()));
    }

    fn push(&self, incoming: Incoming) {
        self.state.lock().unwrap().incoming.push_back(incoming);
        self.wake.notify_one();
    }

    /// Set whether every connect should fail.
    pub fn set_connect_fail(&self, fail: bool) {
        self.state.lock().unwrap().connect_fail = fail;
    }

    /// Make the next `n` connects fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().unwrap().fail_next = n;
    }

    /// Let `n` more sends through, then break the connection on the next one.
    pub fn break_after_sends(&self, n: usize) {
        self.state.lock().unwrap().sends_before_break = Some(n);
    }

    /// Get all frames that were sent.
    pub fn sent(&self) -> Vec<Frame> {
        self.state.lock().unwrap().outgoing.clone()
    }

    /// Sent frames of one type, as channel names.
    pub fn sent_channels(&self, kind: FrameType) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.channel)
            .collect()
    }

    pub fn clear_sent(&self) {
        self.state.lock().unwrap().outgoing.clear();
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn last_endpoint(&self) -> Option<Endpoint> {
        self.state.lock().unwrap().endpoints.last().cloned()
    }
}

impl Transport for MockTransport {
    fn connect(
        &mut self,
        endpoint: &Endpoint,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        let endpoint = endpoint.clone();
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.endpoints.push(endpoint);
            if state.connect_fail {
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(TransportError::ConnectionFailed("mock failure".into()));
            }
            state.connected = true;
            state.connects += 1;
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            self.state.lock().unwrap().connected = false;
            Ok(())
        })
    }

    fn send(
        &mut self,
        frame: Frame,
    ) -> Pin<Box<dyn Future<Output = TransportResult<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.connected {
                return Err(TransportError::ConnectionClosed);
            }
            match state.sends_before_break {
                Some(0) => {
                    state.sends_before_break = None;
                    state.connected = false;
                    return Err(TransportError::SendFailed("mock failure".into()));
                }
                Some(n) => state.sends_before_break = Some(n - 1),
                None => {}
            }
            state.outgoing.push(frame);
            Ok(())
        })
    }

    fn recv(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = TransportResult<Option<Frame>>> + Send + '_>> {
        Box::pin(async move {
            loop {
                let next = {
                    let mut state = self.state.lock().unwrap();
                    if !state.connected {
                        return Err(TransportError::ConnectionClosed);
                    }
                    let next = state.incoming.pop_front();
                    if matches!(next, Some(Incoming::Close) | Some(Incoming::Error(_))) {
                        state.connected = false;
                    }
                    next
                };
                match next {
                    Some(Incoming::Frame(frame)) => return Ok(Some(frame)),
                    Some(Incoming::Close) => return Ok(None),
                    Some(Incoming::Error(reason)) => {
                        return Err(TransportError::ReceiveFailed(reason))
                    }
                    None => self.wake.notified().await,
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }
}
