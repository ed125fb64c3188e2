//! Connection lifecycle.
//!
//! [`ConnectionController`] owns a [`Transport`] and runs the state machine:
//!
//! ```text
//! Closed --open()--> Connecting --Opened--> Open
//! Connecting | Open --Error--> Failed
//! Connecting | Open --peer Closed--> Closed
//! any --close()--> Closed
//! ```
//!
//! Nothing here reconnects on its own; `open()` from `Closed` or `Failed` is
//! the user-driven way back. The transport is I/O-agnostic: it reports what
//! happened through [`TransportEvent`]s that the owner feeds to
//! [`ConnectionController::handle`].

use thiserror::Error;
use tracing::{debug, error, info};

use crate::model::ConnectionState;
use crate::protocol::{encode_request, RequestError, RequestId, SolverRequest};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("could not reach the solver: {0}")]
    Connect(String),
    #[error("connection to the solver failed: {0}")]
    Io(String),
    #[error("solver closed the connection{}", reason_suffix(.0))]
    ClosedByPeer(Option<String>),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason.as_deref() {
        Some(r) if !r.is_empty() => format!(" ({r})"),
        _ => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not connected to the solver (connection is {state})")]
pub struct NotConnected {
    pub state: ConnectionState,
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    NotConnected(#[from] NotConnected),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("still waiting for the reply to request {0}")]
    Busy(RequestId),
    #[error("could not encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What a transport reports back, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Message(String),
    Error(String),
    Closed { reason: Option<String> },
}

/// The I/O side of a connection.
///
/// `connect` starts connecting and returns without waiting; readiness arrives
/// later as [`TransportEvent::Opened`]. `shutdown` must tolerate being called
/// in any state, including before `connect` and more than once.
pub trait Transport {
    fn connect(&mut self) -> Result<(), TransportError>;
    fn transmit(&mut self, frame: String) -> Result<(), TransportError>;
    fn shutdown(&mut self);
}

/// What the owner should do after feeding an event to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Message(String),
    Lost(TransportError),
    /// Event does not apply to the current state (e.g. a late frame after
    /// `close()`).
    Ignored,
}

#[derive(Debug)]
pub struct ConnectionController<T: Transport> {
    transport: T,
    state: ConnectionState,
    tag_requests: bool,
    last_error: Option<TransportError>,
}

impl<T: Transport> ConnectionController<T> {
    pub fn new(transport: T, tag_requests: bool) -> Self {
        Self {
            transport,
            state: ConnectionState::Closed,
            tag_requests,
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Start connecting. A no-op while already `Connecting` or `Open`.
    pub fn open(&mut self) -> ConnectionState {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Open) {
            return self.state;
        }
        self.last_error = None;
        self.transition(ConnectionState::Connecting);
        if let Err(e) = self.transport.connect() {
            error!("{}", e);
            self.last_error = Some(e);
            self.transition(ConnectionState::Failed);
        }
        self.state
    }

    /// Hand a request to the transport. Only valid while `Open`.
    pub fn send(&mut self, request: &SolverRequest) -> Result<(), SendError> {
        if self.state != ConnectionState::Open {
            return Err(NotConnected { state: self.state }.into());
        }
        let frame = encode_request(request, self.tag_requests)?;
        debug!(id = %request.id, "sending {}", frame);
        if let Err(e) = self.transport.transmit(frame) {
            error!("{}", e);
            self.last_error = Some(e.clone());
            self.transition(ConnectionState::Failed);
            return Err(e.into());
        }
        Ok(())
    }

    /// Release the transport. Always calls `shutdown`, whatever the state.
    pub fn close(&mut self) {
        self.transport.shutdown();
        self.transition(ConnectionState::Closed);
    }

    pub fn handle(&mut self, event: TransportEvent) -> ConnectionEvent {
        use ConnectionState::*;

        match (self.state, event) {
            (Connecting, TransportEvent::Opened) => {
                info!("connected to solver");
                self.transition(Open);
                ConnectionEvent::StateChanged(Open)
            }
            (Open, TransportEvent::Message(text)) => ConnectionEvent::Message(text),
            (Connecting | Open, TransportEvent::Error(message)) => {
                let err = if self.state == Connecting {
                    TransportError::Connect(message)
                } else {
                    TransportError::Io(message)
                };
                error!("{}", err);
                self.last_error = Some(err.clone());
                self.transition(Failed);
                ConnectionEvent::Lost(err)
            }
            (Connecting | Open, TransportEvent::Closed { reason }) => {
                let err = TransportError::ClosedByPeer(reason);
                info!("{}", err);
                self.last_error = Some(err.clone());
                self.transition(Closed);
                ConnectionEvent::Lost(err)
            }
            (state, event) => {
                debug!(%state, ?event, "ignoring transport event");
                ConnectionEvent::Ignored
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "connection state");
            self.state = next;
        }
    }
}

impl<T: Transport> Drop for ConnectionController<T> {
    fn drop(&mut self) {
        self.close();
    }
}
