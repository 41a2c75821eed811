//! WebSocket transport.
//!
//! [`WsTransport`] executes the `Open`/`Close` actions of the session and
//! reports socket events back as [`TransportEvent`]s. Each socket runs in its
//! own tokio task; the runtime only sees a single event channel, so protocol
//! logic stays in the sans-IO state machines.
//!
//! Every link ends with exactly one `Closed` event unless the runtime closed
//! it first.

use std::{collections::HashMap, future::Future, io};

use futures::{SinkExt, StreamExt};
use roomlink_core::{CloseCode, FrameSink, TransportEvent, TransportId};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    Message,
    protocol::{CloseFrame, frame::coding::CloseCode as WsCloseCode},
};

/// Executes transport actions and yields transport events.
pub trait Transport: FrameSink {
    /// Start connecting `transport` to `url`.
    fn open(&mut self, transport: TransportId, url: String);

    /// Close `transport`. Unknown ids are ignored.
    fn close(&mut self, transport: TransportId, code: CloseCode, reason: String);

    /// Next event from any transport. `None` once no more events can arrive.
    fn next_event(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;
}

#[derive(Debug)]
enum LinkCommand {
    Text(String),
    Close { code: CloseCode, reason: String },
}

/// Transport backed by `tokio-tungstenite`.
#[derive(Debug)]
pub struct WsTransport {
    links: HashMap<TransportId, mpsc::UnboundedSender<LinkCommand>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Default for WsTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WsTransport {
    /// Transport with no open links.
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self { links: HashMap::new(), events_tx, events_rx }
    }

    /// Number of links the transport still tracks.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }
}

impl FrameSink for WsTransport {
    fn send_text(&mut self, transport: TransportId, text: String) -> io::Result<()> {
        let link = self
            .links
            .get(&transport)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no such transport"))?;
        link.send(LinkCommand::Text(text))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "socket task has exited"))
    }
}

impl Transport for WsTransport {
    fn open(&mut self, transport: TransportId, url: String) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        self.links.insert(transport, commands_tx);
        tokio::spawn(run_link(transport, url, commands_rx, self.events_tx.clone()));
    }

    fn close(&mut self, transport: TransportId, code: CloseCode, reason: String) {
        if let Some(link) = self.links.remove(&transport) {
            let _ = link.send(LinkCommand::Close { code, reason });
        }
    }

    async fn next_event(&mut self) -> Option<TransportEvent> {
        let event = self.events_rx.recv().await?;
        if let TransportEvent::Closed { transport, .. } = &event {
            self.links.remove(transport);
        }
        Some(event)
    }
}

/// Drive one socket until it closes.
async fn run_link(
    transport: TransportId,
    url: String,
    mut commands: mpsc::UnboundedReceiver<LinkCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let emit = |event: TransportEvent| {
        let _ = events.send(event);
    };
    let fail = |reason: String| {
        emit(TransportEvent::Error { transport, reason });
        emit(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL });
    };

    let handshake = tokio::select! {
        result = tokio_tungstenite::connect_async(url.as_str()) => result,
        command = commands.recv() => {
            // Closed mid-handshake; dropping the future drops the socket.
            tracing::trace!(%transport, closed = command.is_some(), "handshake abandoned");
            return;
        },
    };
    let stream = match handshake {
        Ok((stream, _)) => stream,
        Err(e) => {
            tracing::debug!(%transport, %url, error = %e, "connect failed");
            fail(e.to_string());
            return;
        },
    };
    emit(TransportEvent::Opened { transport });

    let (mut write, mut read) = stream.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(LinkCommand::Text(text)) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        fail(e.to_string());
                        return;
                    }
                },
                Some(LinkCommand::Close { code, reason }) => {
                    let frame = CloseFrame { code: WsCloseCode::from(code.0), reason: reason.into() };
                    let _ = write.send(Message::Close(Some(frame))).await;
                    let _ = write.close().await;
                    tracing::trace!(%transport, %code, "closed locally");
                    return;
                },
                None => {
                    let _ = write.close().await;
                    return;
                },
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    emit(TransportEvent::Frame { transport, text: text.as_str().to_owned() });
                },
                Some(Ok(Message::Close(frame))) => {
                    let code = frame.map_or(CloseCode::ABNORMAL, |frame| CloseCode(frame.code.into()));
                    emit(TransportEvent::Closed { transport, code });
                    return;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    fail(e.to_string());
                    return;
                },
                None => {
                    emit(TransportEvent::Closed { transport, code: CloseCode::ABNORMAL });
                    return;
                },
            },
        }
    }
}
