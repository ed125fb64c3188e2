//! The view controller: one model, one connection, one profile.
//!
//! [`SolverView`] is what a frontend owns. It routes user actions and transport
//! events to the model and the connection, keeps the user-visible status line,
//! and derives the scene on demand. Dropping the view closes the connection.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::connection::{
    ConnectionController, ConnectionEvent, NotConnected, SendError, Transport, TransportError,
    TransportEvent,
};
use crate::model::{Applied, ConnectionState, SceneModel};
use crate::profile::ScaleProfile;
use crate::protocol::{build_request, ReplyError, RequestId, ResponseInterpreter};
use crate::render::{Scene, ViewportRenderer};

/// What a transport event did, for the frontend to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    ConnectionChanged(ConnectionState),
    OutcomeChanged,
    StaleReply,
    Unrecognized(ReplyError),
    Lost(TransportError),
    Nothing,
}

pub struct SolverView<T: Transport> {
    profile: Arc<ScaleProfile>,
    model: SceneModel,
    connection: ConnectionController<T>,
    interpreter: ResponseInterpreter,
    tag_requests: bool,
    notice: Option<String>,
    unrecognized_replies: u64,
}

impl<T: Transport> SolverView<T> {
    pub fn new(profile: Arc<ScaleProfile>, transport: T, tag_requests: bool) -> Self {
        Self {
            model: SceneModel::new(&profile),
            interpreter: ResponseInterpreter::for_profile(&profile),
            connection: ConnectionController::new(transport, tag_requests),
            profile,
            tag_requests,
            notice: None,
            unrecognized_replies: 0,
        }
    }

    pub fn profile(&self) -> &ScaleProfile {
        &self.profile
    }

    pub fn model(&self) -> &SceneModel {
        &self.model
    }

    /// Local edits only; nothing here touches the network.
    pub fn model_mut(&mut self) -> (&mut SceneModel, &ScaleProfile) {
        (&mut self.model, self.profile.as_ref())
    }

    pub fn connection(&self) -> &ConnectionController<T> {
        &self.connection
    }

    /// The transport itself, for frontend-specific teardown. Connection
    /// state still only changes through `activate`/`deactivate`.
    pub fn transport_mut(&mut self) -> &mut T {
        self.connection.transport_mut()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some(notice.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn unrecognized_replies(&self) -> u64 {
        self.unrecognized_replies
    }

    /// Open the connection (view activation, or a user-driven reconnect).
    pub fn activate(&mut self) -> ConnectionState {
        let state = self.connection.open();
        self.model.set_connection(state);
        if let Some(err) = self.connection.last_error() {
            self.notice = Some(err.to_string());
        }
        state
    }

    /// Close the connection. Safe to call in any state, any number of times.
    pub fn deactivate(&mut self) {
        self.connection.close();
        self.model.set_connection(self.connection.state());
    }

    /// Build a request from the current inputs and hand it to the connection.
    ///
    /// On error the model is left as it was and the reason becomes the notice.
    pub fn submit(&mut self) -> Result<RequestId, SendError> {
        let result = self.try_submit();
        self.model.set_connection(self.connection.state());
        match &result {
            Ok(id) => {
                info!(%id, "request sent");
                self.notice = None;
            }
            Err(e) => {
                warn!("request not sent: {}", e);
                self.notice = Some(e.to_string());
            }
        }
        result
    }

    fn try_submit(&mut self) -> Result<RequestId, SendError> {
        let state = self.connection.state();
        if state != ConnectionState::Open {
            return Err(NotConnected { state }.into());
        }
        if let Some(outstanding) = self.model.outstanding_request() {
            // Without echoed ids a second request would be indistinguishable
            // on reply.
            if !self.tag_requests {
                return Err(SendError::Busy(outstanding));
            }
        }
        let id = self.model.peek_request_id();
        let request = build_request(id, self.model.target(), self.model.configuration())?;
        self.connection.send(&request)?;
        self.model.commit_request(id);
        Ok(id)
    }

    pub fn handle(&mut self, event: TransportEvent) -> ViewEvent {
        match self.connection.handle(event) {
            ConnectionEvent::StateChanged(state) => {
                self.model.set_connection(state);
                if state == ConnectionState::Open {
                    self.notice = None;
                }
                ViewEvent::ConnectionChanged(state)
            }
            ConnectionEvent::Message(text) => match self.interpreter.interpret(&text) {
                Ok(reply) => match self.model.apply(reply) {
                    Applied::Replaced => {
                        self.notice = None;
                        ViewEvent::OutcomeChanged
                    }
                    Applied::Stale => ViewEvent::StaleReply,
                },
                Err(e) => {
                    self.unrecognized_replies += 1;
                    warn!(error = %e, raw = %text, "dropping solver reply");
                    ViewEvent::Unrecognized(e)
                }
            },
            ConnectionEvent::Lost(err) => {
                self.model.set_connection(self.connection.state());
                if let Some(id) = self.model.outstanding_request() {
                    self.model
                        .fail_pending(id, format!("no reply to request {id}: {err}"));
                }
                self.notice = Some(err.to_string());
                ViewEvent::Lost(err)
            }
            ConnectionEvent::Ignored => ViewEvent::Nothing,
        }
    }

    /// Give up on `request` if it is still the one being waited for.
    pub fn expire(&mut self, request: RequestId, after: Duration) -> bool {
        let message = format!("solver did not reply within {} ms", after.as_millis());
        let expired = self.model.fail_pending(request, message);
        if expired {
            warn!(%request, "request timed out");
        }
        expired
    }

    pub fn scene(&self) -> Scene {
        ViewportRenderer::new(&self.profile).derive(&self.model)
    }
}
