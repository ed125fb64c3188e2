//! The running client: a [`SolverView`] driven by tokio.
//!
//! One task owns the session and multiplexes user input, transport events,
//! the request deadline and the frame clock with `tokio::select!`. The core
//! types are never shared across tasks.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use ikviz::connection::{SendError, TransportError};
use ikviz::float_fmt::fmt_label;
use ikviz::model::{
    ArmConfiguration, ConnectionState, EditError, Point3, SceneModel, SolverOutcome,
    TargetPosition,
};
use ikviz::profile::ScaleProfile;
use ikviz::protocol::RequestId;
use ikviz::view::{SolverView, ViewEvent};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::commands::{Command, HELP};
use crate::config::ClientConfig;
use crate::panel::{results_panel, status_line};
use crate::transport::{EventReceiver, TaggedEvent, WsTransport};

pub const FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// How long `close` waits for the socket to finish its goodbye.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error(transparent)]
    Lost(#[from] TransportError),
    #[error("transport event stream ended")]
    Ended,
}

pub struct Session {
    view: SolverView<WsTransport>,
    events: EventReceiver,
    request_timeout: Option<Duration>,
    deadline: Option<(RequestId, Instant)>,
    primitive_count: usize,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        let (transport, events) = WsTransport::new(config.endpoint.clone());
        let view = SolverView::new(
            Arc::new(config.profile.clone()),
            transport,
            config.tag_requests,
        );
        Self {
            view,
            events,
            request_timeout: config.request_timeout,
            deadline: None,
            primitive_count: 0,
        }
    }

    pub fn view(&self) -> &SolverView<WsTransport> {
        &self.view
    }

    pub fn model(&self) -> &SceneModel {
        self.view.model()
    }

    pub fn status(&self) -> String {
        status_line(self.view.model(), self.view.notice())
    }

    pub fn connect(&mut self) -> ConnectionState {
        self.view.activate()
    }

    pub fn disconnect(&mut self) {
        self.view.deactivate();
    }

    /// Disconnect and give the socket task time to send its close frame.
    pub async fn close(mut self) {
        self.disconnect();
        self.view.transport_mut().settle(CLOSE_GRACE).await;
    }

    pub fn submit(&mut self) -> Result<RequestId, SendError> {
        let id = self.view.submit()?;
        self.deadline = self.request_timeout.map(|t| (id, Instant::now() + t));
        Ok(id)
    }

    /// Apply a local edit and record its error, if any, as the notice.
    pub fn edit<F>(&mut self, f: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut SceneModel, &ScaleProfile) -> Result<(), EditError>,
    {
        let (model, profile) = self.view.model_mut();
        let result = f(model, profile);
        match &result {
            Ok(()) => self.view.clear_notice(),
            Err(e) => self.view.set_notice(e.to_string()),
        }
        result
    }

    /// Wait for the next event from the live socket, or for the pending
    /// request to run out of time. `None` once the event stream is gone.
    pub async fn next_event(&mut self) -> Option<ViewEvent> {
        loop {
            let deadline = self.deadline;
            tokio::select! {
                tagged = self.events.recv() => {
                    if let Some(event) = self.accept(tagged?) {
                        return Some(event);
                    }
                }
                _ = sleep_until(deadline.map_or_else(Instant::now, |(_, at)| at)), if deadline.is_some() => {
                    if self.expire_overdue() {
                        return Some(ViewEvent::OutcomeChanged);
                    }
                }
            }
        }
    }

    fn accept(&mut self, tagged: TaggedEvent) -> Option<ViewEvent> {
        if !self.view.connection().transport().is_current(&tagged) {
            debug!(generation = tagged.generation, "dropping event from a released socket");
            return None;
        }
        let event = self.view.handle(tagged.event);
        if !self.view.model().outcome().is_pending() {
            self.deadline = None;
        }
        Some(event)
    }

    fn expire_overdue(&mut self) -> bool {
        match (self.deadline.take(), self.request_timeout) {
            (Some((id, _)), Some(timeout)) => self.view.expire(id, timeout),
            _ => false,
        }
    }

    /// Connect and wait until the socket is open.
    pub async fn wait_open(&mut self) -> Result<(), SessionError> {
        if self.connect() == ConnectionState::Failed {
            let err = self
                .view
                .connection()
                .last_error()
                .cloned()
                .unwrap_or_else(|| TransportError::Connect("connect failed".to_string()));
            return Err(err.into());
        }
        loop {
            match self.next_event().await {
                Some(ViewEvent::ConnectionChanged(ConnectionState::Open)) => return Ok(()),
                Some(ViewEvent::Lost(err)) => return Err(err.into()),
                Some(_) => {}
                None => return Err(SessionError::Ended),
            }
        }
    }

    /// One request for `position`, start to finish.
    pub async fn solve(
        &mut self,
        position: Point3,
        configuration: Option<ArmConfiguration>,
    ) -> Result<SolverOutcome, SessionError> {
        self.edit(|model, profile| {
            let step = model.input_step();
            model.reset_target(TargetPosition::for_step(position, step));
            match configuration {
                Some(c) => model.set_configuration(c, profile),
                None => Ok(()),
            }
        })?;

        self.wait_open().await?;
        self.submit()?;
        while self.view.model().outcome().is_pending() {
            if self.next_event().await.is_none() {
                return Err(SessionError::Ended);
            }
        }
        Ok(self.view.model().outcome().clone())
    }

    /// Read commands from `input` until `quit` or end of input.
    pub async fn run_interactive<R, W>(&mut self, input: R, out: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        let mut frames = tokio::time::interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        writeln!(out, "type 'help' for commands")?;
        self.connect();
        writeln!(out, "{}", self.status())?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(Command::Quit) => break,
                        Ok(command) => self.execute(command, out)?,
                        Err(e) => writeln!(out, "{e}")?,
                    }
                }
                event = self.next_event() => match event {
                    Some(event) => self.report(event, out)?,
                    None => break,
                },
                _ = frames.tick() => self.frame(),
            }
        }

        self.disconnect();
        Ok(())
    }

    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<()> {
        match command {
            Command::SetAxis(axis, text) => {
                let (model, _) = self.view.model_mut();
                if model.set_axis_text(axis, text.as_str()).is_none() {
                    let keep = model
                        .target()
                        .value(axis)
                        .map_or_else(|| "no value".to_string(), fmt_label);
                    writeln!(out, "{axis}: '{text}' is not a number, keeping {keep}")?;
                }
            }
            Command::Nudge(axis, direction) => {
                let r = self.edit(|model, _| model.nudge(axis, direction).map(|_| ()));
                self.report_edit(r, out)?;
            }
            Command::Step(step) => {
                let r = self.edit(|model, profile| model.set_input_step(step, profile));
                self.report_edit(r, out)?;
            }
            Command::Arm(arm) => {
                let r = self.edit(|model, profile| model.set_arm(arm, profile));
                self.report_edit(r, out)?;
            }
            Command::Elbow(elbow) => {
                let r = self.edit(|model, profile| model.set_elbow(elbow, profile));
                self.report_edit(r, out)?;
            }
            Command::Config(label) => {
                let r = self.edit(|model, profile| model.set_config_label(label, profile));
                self.report_edit(r, out)?;
            }
            Command::Send => match self.submit() {
                Ok(id) => writeln!(out, "sent request {id}")?,
                Err(e) => writeln!(out, "{e}")?,
            },
            Command::Show => {
                writeln!(out, "{}", self.status())?;
                for line in results_panel(self.view.model().outcome()) {
                    writeln!(out, "  {line}")?;
                }
            }
            Command::Scene => {
                let json = serde_json::to_string_pretty(&self.view.scene()).map_err(io::Error::other)?;
                writeln!(out, "{json}")?;
            }
            Command::Connect => {
                self.connect();
                writeln!(out, "{}", self.status())?;
            }
            Command::Disconnect => {
                self.disconnect();
                self.deadline = None;
                writeln!(out, "{}", self.status())?;
            }
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Quit => {}
        }
        Ok(())
    }

    fn report_edit<W: Write>(&self, result: Result<(), EditError>, out: &mut W) -> io::Result<()> {
        match result {
            Ok(()) => writeln!(out, "{}", self.status()),
            Err(e) => writeln!(out, "{e}"),
        }
    }

    fn report<W: Write>(&self, event: ViewEvent, out: &mut W) -> io::Result<()> {
        match event {
            ViewEvent::ConnectionChanged(_) => writeln!(out, "{}", self.status())?,
            ViewEvent::OutcomeChanged => {
                for line in results_panel(self.view.model().outcome()) {
                    writeln!(out, "  {line}")?;
                }
            }
            ViewEvent::Unrecognized(e) => writeln!(out, "ignored reply: {e}")?,
            ViewEvent::Lost(err) => {
                writeln!(out, "{err}; type 'connect' to retry")?;
                if let SolverOutcome::Failure { message } = self.view.model().outcome() {
                    writeln!(out, "  {message}")?;
                }
            }
            ViewEvent::StaleReply | ViewEvent::Nothing => {}
        }
        Ok(())
    }

    fn frame(&mut self) {
        let count = self.view.scene().primitives.len();
        if count != self.primitive_count {
            info!(primitives = count, "scene changed");
            self.primitive_count = count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_endpoint;
    use ikviz::model::Axis;

    fn session() -> Session {
        let config = ClientConfig {
            endpoint: parse_endpoint("ws://127.0.0.1:9/ws").unwrap(),
            profile: ScaleProfile::robot_mm(),
            request_timeout: None,
            tag_requests: false,
        };
        Session::new(&config)
    }

    fn run(session: &mut Session, line: &str) -> String {
        let mut out = Vec::new();
        let command: Command = line.parse().unwrap();
        session.execute(command, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn invalid_axis_text_reports_kept_value() {
        let mut s = session();
        let out = run(&mut s, "x abc");
        assert_eq!(out, "X: 'abc' is not a number, keeping -149.09\n");
        assert_eq!(s.model().target().value(Axis::X), Some(-149.09));
    }

    #[test]
    fn nudge_uses_selected_step() {
        let mut s = session();
        run(&mut s, "step 10");
        run(&mut s, "nudge z -");
        assert_eq!(s.model().target().axis(Axis::Z).raw(), "10.23");
    }

    #[test]
    fn bad_edit_sets_notice() {
        let mut s = session();
        let out = run(&mut s, "step 3");
        assert_eq!(out, "step 3 is not offered by this profile\n");
        assert!(s.status().ends_with("| step 3 is not offered by this profile"));

        let out = run(&mut s, "config elbow_left");
        assert!(out.contains("different configuration selector"));
    }

    #[test]
    fn send_while_closed_is_refused() {
        let mut s = session();
        let out = run(&mut s, "send");
        assert!(out.starts_with("not connected to the solver"));
        assert_eq!(s.model().outcome(), &SolverOutcome::None);
    }

    #[test]
    fn scene_prints_json() {
        let mut s = session();
        let out = run(&mut s, "scene");
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert!(value["primitives"].as_array().unwrap().len() > 60);
    }
}
