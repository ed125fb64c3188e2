//! WebSocket transport for the solver connection.
//!
//! Each `connect` spawns one task that owns the socket. Frames go to it over
//! an unbounded channel; everything it observes comes back as a
//! [`TaggedEvent`] carrying the generation of the attempt that produced it.
//! `shutdown` and `connect` both start a new generation, so events from a
//! socket that was let go can be recognised and dropped.
//!
//! `shutdown` only signals the task. Call [`WsTransport::settle`] before the
//! runtime stops if the close frame has to reach the solver.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use ikviz::connection::{Transport, TransportError, TransportEvent};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: TransportEvent,
}

pub type EventReceiver = UnboundedReceiver<TaggedEvent>;

#[derive(Debug)]
pub struct WsTransport {
    url: Url,
    generation: u64,
    outbound: Option<UnboundedSender<String>>,
    events: UnboundedSender<TaggedEvent>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    /// The transport plus the receiving end of its event stream.
    pub fn new(url: Url) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let transport = Self {
            url,
            generation: 0,
            outbound: None,
            events,
            task: None,
        };
        (transport, rx)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, event: &TaggedEvent) -> bool {
        event.generation == self.generation
    }

    /// Wait up to `limit` for the latest socket task to finish.
    pub async fn settle(&mut self, limit: Duration) {
        let Some(task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("socket task failed: {}", e),
            Err(_) => debug!("socket task still running after {:?}", limit),
        }
    }
}

impl Transport for WsTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let runtime = Handle::try_current().map_err(|e| TransportError::Connect(e.to_string()))?;

        self.outbound = None;
        self.generation += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        info!("Connecting to {}", self.url);
        // A replaced task keeps running detached until its sender is gone.
        self.task = Some(runtime.spawn(run_socket(
            self.url.clone(),
            self.generation,
            rx,
            self.events.clone(),
        )));
        Ok(())
    }

    fn transmit(&mut self, frame: String) -> Result<(), TransportError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| TransportError::Io("no socket".to_string()))?;
        outbound
            .send(frame)
            .map_err(|_| TransportError::Io("socket task has stopped".to_string()))
    }

    fn shutdown(&mut self) {
        // Dropping the sender tells the socket task to send a close frame.
        if self.outbound.take().is_some() {
            debug!(generation = self.generation, "releasing socket");
        }
        self.generation += 1;
    }
}

struct Emitter {
    generation: u64,
    events: UnboundedSender<TaggedEvent>,
}

impl Emitter {
    fn emit(&self, event: TransportEvent) {
        // The receiver only goes away when the whole client is shutting down.
        let _ = self.events.send(TaggedEvent {
            generation: self.generation,
            event,
        });
    }
}

async fn run_socket(
    url: Url,
    generation: u64,
    mut outbound: UnboundedReceiver<String>,
    events: UnboundedSender<TaggedEvent>,
) {
    let emitter = Emitter { generation, events };

    let ws = match connect_async(url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(e) => {
            emitter.emit(TransportEvent::Error(e.to_string()));
            return;
        }
    };
    emitter.emit(TransportEvent::Opened);

    let (mut write, mut read) = ws.split();
    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        emitter.emit(TransportEvent::Error(e.to_string()));
                        return;
                    }
                }
                None => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!("close frame not sent: {}", e);
                    }
                    return;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    emitter.emit(TransportEvent::Message(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => emitter.emit(TransportEvent::Message(text)),
                    Err(_) => warn!("dropping non-UTF-8 binary frame ({} bytes)", bytes.len()),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty());
                    emitter.emit(TransportEvent::Closed { reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    emitter.emit(TransportEvent::Error(e.to_string()));
                    return;
                }
                None => {
                    emitter.emit(TransportEvent::Closed { reason: None });
                    return;
                }
            },
        }
    }
}
