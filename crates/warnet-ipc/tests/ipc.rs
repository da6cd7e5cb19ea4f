//! End-to-end tests for the IPC layer: a real socket, a real client,
//! and a minimal command responder standing in for the daemon loop.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use warnet_api::{
    Audience, Command, CustomerStatus, Event, EventPayload, Response, ResponsePayload,
    ResponseResult,
};
use warnet_ipc::{IpcClient, IpcServer, ServerMessage};
use warnet_util::CustomerId;

async fn spawn_server(dir: &TempDir) -> (Arc<IpcServer>, PathBuf) {
    let socket_path = dir.path().join("warnetd.sock");

    let mut server = IpcServer::new(&socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);

    let mut messages = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let responder = server.clone();
    tokio::spawn(async move {
        while let Some(msg) = messages.recv().await {
            if let ServerMessage::Request { client_id, request } = msg {
                let payload = match request.command {
                    Command::Ping => ResponsePayload::Pong,
                    Command::SubscribeEvents => ResponsePayload::Subscribed {
                        client_id: client_id.clone(),
                    },
                    Command::AttachCustomer { customer_id } => {
                        ResponsePayload::Attached { customer_id }
                    }
                    _ => ResponsePayload::Pong,
                };
                let _ = responder
                    .send_response(&client_id, Response::success(request.request_id, payload))
                    .await;
            }
        }
    });

    (server, socket_path)
}

#[tokio::test]
async fn ping_round_trip() {
    let dir = TempDir::new().unwrap();
    let (_server, socket_path) = spawn_server(&dir).await;

    let mut client = IpcClient::connect(&socket_path).await.unwrap();
    let response = client.send(Command::Ping).await.unwrap();

    assert!(matches!(
        response.result,
        ResponseResult::Ok(ResponsePayload::Pong)
    ));
}

#[tokio::test]
async fn subscriber_receives_admin_events() {
    let dir = TempDir::new().unwrap();
    let (server, socket_path) = spawn_server(&dir).await;

    // Same-UID connections get the admin role.
    let client = IpcClient::connect(&socket_path).await.unwrap();
    let mut events = client.subscribe().await.unwrap();

    server.notify(
        Audience::Admins,
        Event::new(EventPayload::CustomerStatusChanged {
            customer_id: CustomerId::new(5),
            status: CustomerStatus::Active,
        }),
    );

    let event = events.next().await.unwrap();
    assert!(matches!(
        event.payload,
        EventPayload::CustomerStatusChanged {
            status: CustomerStatus::Active,
            ..
        }
    ));
}

#[tokio::test]
async fn attached_station_gets_only_its_channel() {
    let dir = TempDir::new().unwrap();
    let (server, socket_path) = spawn_server(&dir).await;

    let client = IpcClient::connect(&socket_path).await.unwrap();
    let mut events = client.attach(CustomerId::new(7)).await.unwrap();

    // Another customer's update must not leak to this connection.
    server.notify(
        Audience::Customer(CustomerId::new(8)),
        Event::new(EventPayload::SessionUpdate {
            time_remaining: 999,
            balance: 0,
        }),
    );
    server.notify(
        Audience::Customer(CustomerId::new(7)),
        Event::new(EventPayload::SessionUpdate {
            time_remaining: 42,
            balance: 1_000,
        }),
    );

    let event = events.next().await.unwrap();
    assert!(matches!(
        event.payload,
        EventPayload::SessionUpdate {
            time_remaining: 42,
            balance: 1_000
        }
    ));
}

#[tokio::test]
async fn shutdown_reaches_every_connection() {
    let dir = TempDir::new().unwrap();
    let (server, socket_path) = spawn_server(&dir).await;

    let client = IpcClient::connect(&socket_path).await.unwrap();
    let mut events = client.attach(CustomerId::new(9)).await.unwrap();

    server.notify(Audience::All, Event::new(EventPayload::Shutdown));

    let event = events.next().await.unwrap();
    assert!(matches!(event.payload, EventPayload::Shutdown));
}
