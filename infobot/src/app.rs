//! Application context: the reconnect loop and both shutdown paths.
//!
//! [`App`] owns the long-lived state (store and connection settings). The
//! binary builds one at startup and hands it a shutdown future; nothing
//! lives in globals.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use infobot_sdk::client::{self, ClientHandle, ConnectConfig, ReconnectConfig};
use infobot_sdk::event::Event;
use tokio::sync::mpsc;

use crate::session::{SessionConfig, SessionController, FAREWELL};
use crate::store::{FactoidStore, StoreError};

/// Resolves with the name of the signal that asked us to stop.
pub type ShutdownSignal = Pin<Box<dyn Future<Output = &'static str> + Send>>;

/// How long to wait for the client task to put QUIT on the wire.
const QUIT_GRACE: Duration = Duration::from_secs(2);

/// Long-lived state shared with the shutdown paths.
pub struct App {
    pub store: Arc<FactoidStore>,
    pub connect: ConnectConfig,
    pub session: SessionConfig,
    pub reconnect: ReconnectConfig,
}

/// Why a connection's event loop ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The transport went away; reconnect.
    Disconnected,
    /// A signal arrived. The farewell has been sent.
    Signal(&'static str),
    /// The store failed mid-session. The farewell has been sent.
    Fatal(anyhow::Error),
}

impl App {
    /// Connect, serve, and reconnect with backoff until a signal or a
    /// store failure ends the process.
    pub async fn run(&self, mut shutdown: ShutdownSignal) -> Result<()> {
        let mut delay = self.reconnect.initial_delay;

        loop {
            tracing::info!(server = %self.connect.server_addr, "Connecting to IRC server");
            match client::establish_connection(&self.connect).await {
                Ok(conn) => {
                    delay = self.reconnect.initial_delay;
                    let (handle, mut events) = client::connect_with_stream(conn, self.connect.clone());
                    match self.serve(handle, &mut events, &mut shutdown).await {
                        SessionEnd::Disconnected => {}
                        SessionEnd::Signal(_) => return Ok(()),
                        SessionEnd::Fatal(e) => return Err(e),
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connection failed");
                }
            }

            tracing::info!(delay_secs = delay.as_secs(), "Disconnected, will reconnect");
            tokio::select! {
                name = &mut shutdown => {
                    tracing::info!("Received {name}. Shutting down...");
                    self.store.close();
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
            delay = self.reconnect.next_delay(delay);
        }
    }

    /// Run one connection's session until it ends. On a signal or a store
    /// failure the store is closed and the farewell sent before returning.
    pub async fn serve(
        &self,
        handle: ClientHandle,
        events: &mut mpsc::Receiver<Event>,
        shutdown: &mut ShutdownSignal,
    ) -> SessionEnd {
        let mut session =
            SessionController::new(handle.clone(), self.store.clone(), self.session.clone());

        let end = drive(&mut session, events, shutdown).await;
        match &end {
            SessionEnd::Disconnected => {}
            SessionEnd::Signal(name) => {
                tracing::info!("Received {name}. Shutting down...");
                self.shutdown(&handle, events).await;
            }
            SessionEnd::Fatal(e) => {
                tracing::error!("ERROR: {e:#}");
                self.shutdown(&handle, events).await;
            }
        }
        end
    }

    /// Close the store and send the farewell. Best effort, no retry.
    async fn shutdown(&self, handle: &ClientHandle, events: &mut mpsc::Receiver<Event>) {
        self.store.close();
        if handle.quit(Some(FAREWELL)).await.is_err() {
            return;
        }
        let _ = tokio::time::timeout(QUIT_GRACE, async {
            while let Some(event) = events.recv().await {
                if matches!(event, Event::Disconnected { .. }) {
                    break;
                }
            }
        })
        .await;
    }
}

/// Feed events to the session until the connection ends, a signal
/// arrives, or the store fails.
async fn drive(
    session: &mut SessionController,
    events: &mut mpsc::Receiver<Event>,
    shutdown: &mut ShutdownSignal,
) -> SessionEnd {
    loop {
        let event = tokio::select! {
            name = &mut *shutdown => return SessionEnd::Signal(name),
            event = events.recv() => event,
        };
        let Some(event) = event else {
            return SessionEnd::Disconnected;
        };

        if let Err(e) = session.handle_event(&event).await {
            if e.downcast_ref::<StoreError>().is_some() {
                return SessionEnd::Fatal(e);
            }
            tracing::error!(error = %e, "Event handler error");
        }
        if matches!(event, Event::Disconnected { .. }) {
            return SessionEnd::Disconnected;
        }
    }
}
