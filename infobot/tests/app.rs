//! Shutdown paths of the application context: a signal and a store
//! failure both close the store and send the farewell quit.

use std::sync::Arc;

use tokio::sync::mpsc;

use infobot::app::{App, SessionEnd, ShutdownSignal};
use infobot::session::{SessionConfig, FAREWELL};
use infobot::store::{FactoidStore, StoreError};
use infobot_sdk::client::{ClientHandle, Command, ConnectConfig, ReconnectConfig};
use infobot_sdk::event::Event;

fn make_app(store: FactoidStore) -> App {
    App {
        store: Arc::new(store),
        connect: ConnectConfig::default(),
        session: SessionConfig {
            nick: "bot".to_string(),
            password: "secret".to_string(),
            channels: vec!["#chan".to_string()],
        },
        reconnect: ReconnectConfig::default(),
    }
}

fn never() -> ShutdownSignal {
    Box::pin(std::future::pending::<&'static str>())
}

#[tokio::test(start_paused = true)]
async fn signal_closes_store_and_sends_farewell() {
    let app = make_app(FactoidStore::open_memory().unwrap());
    let (handle, mut outbound) = ClientHandle::detached(16);
    let (_event_tx, mut events) = mpsc::channel(16);
    let mut shutdown: ShutdownSignal = Box::pin(async { "SIGTERM" });

    let end = app.serve(handle, &mut events, &mut shutdown).await;

    assert!(matches!(end, SessionEnd::Signal("SIGTERM")));
    assert!(!app.store.is_open());
    assert_eq!(
        outbound.try_recv().unwrap(),
        Command::Quit(Some(FAREWELL.to_string()))
    );
    assert!(outbound.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn store_failure_closes_store_and_sends_farewell() {
    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("db");
    std::fs::create_dir(&sub).unwrap();
    let app = make_app(FactoidStore::open(sub.join("factoids.db")).unwrap());

    app.store.close();
    std::fs::remove_dir_all(&sub).unwrap();

    let (handle, mut outbound) = ClientHandle::detached(16);
    let (event_tx, mut events) = mpsc::channel(16);
    event_tx
        .send(Event::Message {
            from: "alice".to_string(),
            target: "#chan".to_string(),
            text: "!info color".to_string(),
        })
        .await
        .unwrap();

    let end = app.serve(handle, &mut events, &mut never()).await;

    match end {
        SessionEnd::Fatal(e) => assert!(e.downcast_ref::<StoreError>().is_some()),
        other => panic!("expected a fatal end, got {other:?}"),
    }
    assert!(!app.store.is_open());
    assert_eq!(
        outbound.try_recv().unwrap(),
        Command::Quit(Some(FAREWELL.to_string()))
    );
}

#[tokio::test]
async fn disconnect_leaves_store_open_and_stays_quiet() {
    let app = make_app(FactoidStore::open_memory().unwrap());
    let (handle, mut outbound) = ClientHandle::detached(16);
    let (event_tx, mut events) = mpsc::channel(16);
    event_tx
        .send(Event::Disconnected {
            reason: "EOF".to_string(),
        })
        .await
        .unwrap();

    let end = app.serve(handle, &mut events, &mut never()).await;

    assert!(matches!(end, SessionEnd::Disconnected));
    assert!(app.store.is_open());
    assert!(outbound.try_recv().is_err());
}

#[tokio::test]
async fn usage_errors_do_not_end_the_session() {
    let app = make_app(FactoidStore::open_memory().unwrap());
    let (handle, mut outbound) = ClientHandle::detached(16);
    let (event_tx, mut events) = mpsc::channel(16);
    for event in [
        Event::Message {
            from: "alice".to_string(),
            target: "#chan".to_string(),
            text: "!learn broken".to_string(),
        },
        Event::Disconnected {
            reason: "EOF".to_string(),
        },
    ] {
        event_tx.send(event).await.unwrap();
    }

    let end = app.serve(handle, &mut events, &mut never()).await;

    assert!(matches!(end, SessionEnd::Disconnected));
    assert!(matches!(outbound.try_recv().unwrap(), Command::Privmsg { .. }));
    assert!(outbound.try_recv().is_err());
}
