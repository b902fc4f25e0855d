//! End-to-end call tests over both transports.

use courier_rpc::{
    BlockingClient, ClientConfig, Error, Registry, RpcClient, RpcServer, ServerConfig,
};
use courier_transport_memory::MemoryTransport;
use courier_transport_tcp::TcpTransport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Serialize, Deserialize)]
struct OrderRequest {
    user_id: String,
    items: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum OrderStatus {
    Initiated,
    Completed,
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderResponse {
    id: String,
    status: OrderStatus,
    items: Vec<String>,
}

async fn serve_memory(addr: &str, registry: Registry) -> RpcClient {
    let transport = MemoryTransport::new();
    let server = RpcServer::bind(&transport, addr, registry, ServerConfig::default())
        .await
        .unwrap();
    tokio::spawn(server.serve());

    RpcClient::builder()
        .transport(MemoryTransport::new())
        .addr(addr)
        .pool_size(2)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_hello_world() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut registry = Registry::new();
    registry
        .register_async("hello_world", |(): ()| async move {
            Ok("hello world".to_string())
        })
        .unwrap();

    let client = serve_memory("rpc-hello", registry).await;

    let greeting: String = client.call("hello_world", &()).await.unwrap();
    assert_eq!(greeting, "hello world");
}

#[tokio::test]
async fn test_save_order_over_tcp() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut registry = Registry::new();
    registry
        .register_sync("save_order", |req: OrderRequest| {
            Ok(OrderResponse {
                id: uuid::Uuid::new_v4().to_string(),
                status: OrderStatus::Initiated,
                items: req.items,
            })
        })
        .unwrap();

    let transport = TcpTransport::new_default();
    let server = RpcServer::bind(&transport, "127.0.0.1:0", registry, ServerConfig::default())
        .await
        .unwrap();
    let addr = server.local_addr();
    tokio::spawn(server.serve());

    let client = RpcClient::builder()
        .transport(TcpTransport::new_default())
        .addr(addr)
        .pool_size(4)
        .build()
        .await
        .unwrap();

    let response: OrderResponse = client
        .call(
            "save_order",
            &OrderRequest {
                user_id: "1".to_string(),
                items: vec!["apple".to_string(), "pear".to_string()],
            },
        )
        .await
        .unwrap();

    assert_eq!(response.items, vec!["apple", "pear"]);
    assert!(matches!(response.status, OrderStatus::Initiated));
    assert!(!response.id.is_empty());
}

#[tokio::test]
async fn test_unknown_function_invokes_no_handler() {
    let _ = tracing_subscriber::fmt::try_init();

    let invoked = Arc::new(AtomicBool::new(false));
    let invoked_probe = Arc::clone(&invoked);

    let mut registry = Registry::new();
    registry
        .register_sync("known", move |(): ()| {
            invoked_probe.store(true, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    let client = serve_memory("rpc-not-found", registry).await;

    let result: Result<(), _> = client.call("unknown", &()).await;
    match result {
        Err(Error::Remote(remote)) => assert!(remote.is_function_not_found()),
        other => panic!("expected function-not-found, got {other:?}"),
    }
    assert!(!invoked.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_erroring_handler_keeps_server_alive() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut registry = Registry::new();
    registry
        .register_async("fail", |(): ()| async move {
            Err::<(), _>(anyhow::anyhow!("storage unavailable"))
        })
        .unwrap();
    registry
        .register_async("hello_world", |(): ()| async move {
            Ok("hello world".to_string())
        })
        .unwrap();

    let client = serve_memory("rpc-handler-error", registry).await;

    let result: Result<(), _> = client.call("fail", &()).await;
    match result {
        Err(Error::Remote(remote)) => {
            assert_eq!(remote.code, courier_rpc::RemoteErrorCode::Handler);
            assert!(remote.message.contains("storage unavailable"));
        }
        other => panic!("expected remote handler error, got {other:?}"),
    }

    // The server, and the very connection that carried the failed call,
    // keep serving.
    for _ in 0..4 {
        let greeting: String = client.call("hello_world", &()).await.unwrap();
        assert_eq!(greeting, "hello world");
    }
}

#[tokio::test]
async fn test_panicking_handlers_keep_server_alive() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut registry = Registry::new();
    registry
        .register_sync("panic_sync", |(): ()| -> anyhow::Result<()> {
            panic!("sync boom")
        })
        .unwrap();
    registry
        .register_async("panic_async", |(): ()| async move {
            if true {
                panic!("async boom");
            }
            Ok(())
        })
        .unwrap();
    registry
        .register_async("hello_world", |(): ()| async move {
            Ok("hello world".to_string())
        })
        .unwrap();

    let client = serve_memory("rpc-panics", registry).await;

    for method in ["panic_sync", "panic_async"] {
        let result: Result<(), _> = client.call(method, &()).await;
        assert!(
            matches!(result, Err(Error::Remote(_))),
            "{method} should surface as a remote error"
        );

        let greeting: String = client.call("hello_world", &()).await.unwrap();
        assert_eq!(greeting, "hello world");
    }
}

#[tokio::test]
async fn test_undecodable_payload_is_bad_request() {
    let _ = tracing_subscriber::fmt::try_init();

    let mut registry = Registry::new();
    registry.register_sync("double", |n: i64| Ok(n * 2)).unwrap();

    let client = serve_memory("rpc-bad-payload", registry).await;

    let result: Result<i64, _> = client.call("double", "not a number").await;
    match result {
        Err(Error::Remote(remote)) => {
            assert_eq!(remote.code, courier_rpc::RemoteErrorCode::BadRequest);
        }
        other => panic!("expected bad-request error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_frame_ends_connection() {
    use courier_rpc::Transport;
    use courier_rpc::protocol::{Frame, FrameType};
    use courier_transport::TransportError;

    let _ = tracing_subscriber::fmt::try_init();

    let _client = serve_memory("rpc-close", Registry::new()).await;

    // A raw connection alongside the pooled ones.
    let transport = MemoryTransport::new();
    let mut conn = transport.connect("rpc-close").await.unwrap();

    let close = Frame::new_unchecked(FrameType::Close, courier_rpc::Bytes::new());
    conn.send(close.to_bytes()).await.unwrap();

    match conn.recv().await {
        Err(TransportError::ConnectionClosed) => {}
        other => panic!("expected server to hang up, got {other:?}"),
    }
}

#[tokio::test]
async fn test_ping() {
    let _ = tracing_subscriber::fmt::try_init();

    let client = serve_memory("rpc-ping", Registry::new()).await;
    client.ping().await.unwrap();
}

#[test]
fn test_blocking_client_and_graceful_shutdown() {
    let _ = tracing_subscriber::fmt::try_init();

    let (addr_tx, addr_rx) = std::sync::mpsc::channel();

    let server_thread = std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async move {
            let mut registry = Registry::new();
            registry
                .register_sync("hello_world", |(): ()| Ok("hello world".to_string()))
                .unwrap();

            let transport = TcpTransport::new_default();
            let server =
                RpcServer::bind(&transport, "127.0.0.1:0", registry, ServerConfig::default())
                    .await
                    .unwrap();
            addr_tx
                .send((server.local_addr(), server.shutdown_handle()))
                .unwrap();
            server.serve().await.unwrap();
        });
    });

    let (addr, shutdown) = addr_rx.recv().unwrap();

    let client =
        BlockingClient::connect(TcpTransport::new_default(), addr, ClientConfig::default())
            .unwrap();
    let greeting: String = client.call("hello_world", &()).unwrap();
    assert_eq!(greeting, "hello world");

    client.shutdown();
    shutdown.shutdown();
    server_thread.join().unwrap();
}
