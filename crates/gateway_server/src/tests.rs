// End-to-end tests over loopback listeners
use crate::*;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use module_registry::ModuleManifest;
use route_system::{
    EventResponse, JoinRoomResponse, ModuleClient, RpcError, RpcRequest, RpcResponse, SocketRequest, SocketResponse,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Chat module answering socket events in-process.
#[derive(Debug)]
struct ChatModule;

#[async_trait]
impl ModuleClient for ChatModule {
    async fn call(&self, _handler: &str, _request: RpcRequest) -> Result<RpcResponse, RpcError> {
        RpcResponse::json(&json!({}))
    }

    async fn execute_socket(
        &self,
        _namespace: &str,
        request: SocketRequest,
    ) -> Result<Option<SocketResponse>, RpcError> {
        let response = match request.event.as_str() {
            "connect" => SocketResponse::Events(vec![EventResponse::reply(
                "welcome",
                vec![json!(request.socket_id.to_string())],
            )]),
            "say" => SocketResponse::Events(vec![EventResponse::reply("said", request.params)]),
            "join" => SocketResponse::JoinRoom(JoinRoomResponse {
                rooms: vec!["lobby".to_string()],
            }),
            "shout" => SocketResponse::Events(vec![EventResponse::to_rooms(
                "shouted",
                request.params,
                vec!["lobby".to_string()],
            )]),
            "fail" => return Err(RpcError::internal("handler exploded")),
            _ => return Ok(None),
        };
        Ok(Some(response))
    }
}

/// Module whose connect hook never finishes in time.
#[derive(Debug)]
struct SlowGreeter;

#[async_trait]
impl ModuleClient for SlowGreeter {
    async fn call(&self, _handler: &str, _request: RpcRequest) -> Result<RpcResponse, RpcError> {
        RpcResponse::json(&json!({}))
    }

    async fn execute_socket(
        &self,
        _namespace: &str,
        request: SocketRequest,
    ) -> Result<Option<SocketResponse>, RpcError> {
        if request.event == SocketRequest::CONNECT {
            tokio::time::sleep(Duration::from_secs(30)).await;
            return Ok(Some(SocketResponse::Events(vec![EventResponse::reply("welcome", vec![])])));
        }
        Ok(Some(SocketResponse::Events(vec![EventResponse::reply("said", request.params)])))
    }
}

type Running = (Arc<GatewayServer>, String, tokio::task::JoinHandle<Result<(), ServerError>>);

async fn start() -> Running {
    start_with(ServerConfig::default(), Arc::new(ChatModule)).await
}

async fn start_with(config: ServerConfig, module: Arc<dyn ModuleClient>) -> Running {
    let server = Arc::new(create_server_with_config(config).unwrap());
    server
        .registry()
        .register_with_client(
            ModuleManifest::new("chat", "http://127.0.0.1:9").with_socket("/chat"),
            module,
        )
        .await
        .unwrap();

    let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sockets = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let socket_addr = sockets.local_addr().unwrap();

    let running = server.clone();
    let handle = tokio::spawn(async move { running.serve(http, sockets, None).await });
    (server, format!("ws://{socket_addr}"), handle)
}

async fn send(client: &mut Client, event: &str, args: Value) {
    let frame = json!({"event": event, "args": args}).to_string();
    client.send(Message::Text(frame.into())).await.unwrap();
}

async fn next_frame(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_hook_and_replies() {
    let (server, base, _handle) = start().await;
    let (mut client, _) = connect_async(format!("{base}/chat")).await.unwrap();

    let welcome = next_frame(&mut client).await;
    assert_eq!(welcome["event"], "welcome");

    send(&mut client, "say", json!(["hi", 2])).await;
    let said = next_frame(&mut client).await;
    assert_eq!(said, json!({"event": "said", "data": ["hi", 2]}));

    // Handler failures and junk frames are not surfaced and keep the socket open
    send(&mut client, "fail", json!([])).await;
    client.send(Message::Text("not json".into())).await.unwrap();
    send(&mut client, "say", json!(["still here"])).await;
    assert_eq!(next_frame(&mut client).await["data"], json!(["still here"]));

    assert_eq!(server.connection_manager().connection_count(), 1);
    server.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_room_emission_skips_origin() {
    let (server, base, _handle) = start().await;
    let (mut alice, _) = connect_async(format!("{base}/chat")).await.unwrap();
    let (mut bob, _) = connect_async(format!("{base}/chat")).await.unwrap();
    next_frame(&mut alice).await;
    next_frame(&mut bob).await;

    send(&mut alice, "join", json!([])).await;
    send(&mut bob, "join", json!([])).await;
    let manager = server.connection_manager();
    for _ in 0..100 {
        if manager.room_members("/chat", "lobby").await.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(manager.room_members("/chat", "lobby").await.len(), 2);

    send(&mut alice, "shout", json!(["hey"])).await;
    assert_eq!(next_frame(&mut bob).await, json!({"event": "shouted", "data": ["hey"]}));

    // Alice's next frame is her own reply, not the shout
    send(&mut alice, "say", json!(["after"])).await;
    assert_eq!(next_frame(&mut alice).await["event"], "said");
    server.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_namespace_is_refused() {
    let (server, base, _handle) = start().await;
    assert!(connect_async(format!("{base}/nope")).await.is_err());
    assert_eq!(server.connection_manager().connection_count(), 0);
    server.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_stops_server_and_closes_sockets() {
    let (server, base, handle) = start().await;
    let (mut client, _) = connect_async(format!("{base}/chat")).await.unwrap();
    next_frame(&mut client).await;

    server.shutdown();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return true,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .unwrap();
    assert!(closed);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_connect_hook_does_not_stall_events() {
    let (server, base, _handle) = start_with(ServerConfig::default(), Arc::new(SlowGreeter)).await;
    let (mut client, _) = connect_async(format!("{base}/chat")).await.unwrap();

    send(&mut client, "say", json!(["quick"])).await;
    assert_eq!(next_frame(&mut client).await, json!({"event": "said", "data": ["quick"]}));
    server.shutdown();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_socket_handlers_respect_rpc_deadline() {
    let config = ServerConfig {
        rpc_timeout_ms: 50,
        ..Default::default()
    };
    let (server, base, _handle) = start_with(config, Arc::new(SlowGreeter)).await;
    let (mut client, _) = connect_async(format!("{base}/chat")).await.unwrap();

    let router = server.router();
    for _ in 0..100 {
        if router.get_stats().await.socket_failures == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(router.get_stats().await.socket_failures, 1);

    // The timed-out hook leaves the socket usable
    send(&mut client, "say", json!(["still here"])).await;
    assert_eq!(next_frame(&mut client).await["data"], json!(["still here"]));
    server.shutdown();
}
