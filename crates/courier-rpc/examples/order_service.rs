//! A small order service: one process runs the server, another the client.
//!
//! ```sh
//! cargo run --example order_service -- server
//! cargo run --example order_service -- client
//! ```

use courier_rpc::{Registry, RpcClient, RpcServer, ServerConfig};
use courier_transport_tcp::TcpTransport;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const ADDR: &str = "127.0.0.1:5559";

#[derive(Debug, Serialize, Deserialize)]
struct Order {
    id: Option<String>,
    items: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OrderReceipt {
    id: String,
    status: String,
}

fn hello_world(_: ()) -> anyhow::Result<String> {
    Ok("hello world".to_string())
}

async fn save_order(order: Order) -> anyhow::Result<OrderReceipt> {
    info!("Saving order with {} items", order.items.len());
    Ok(OrderReceipt {
        id: order.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
        status: "INITIATED".to_string(),
    })
}

async fn run_server() -> anyhow::Result<()> {
    let mut registry = Registry::new();
    registry.register_sync("hello_world", hello_world)?;
    registry.register_async("save_order", save_order)?;

    let server = RpcServer::bind(
        &TcpTransport::new_default(),
        ADDR,
        registry,
        ServerConfig::default(),
    )
    .await?;

    info!("Order service listening on {}", server.local_addr());
    server.serve().await?;
    Ok(())
}

async fn run_client() -> anyhow::Result<()> {
    let client = RpcClient::builder()
        .transport(TcpTransport::new_default())
        .addr(ADDR)
        .pool_size(100)
        .build()
        .await?;

    let greeting: String = client.call("hello_world", &()).await?;
    info!("hello_world -> {greeting}");

    let order = Order {
        id: None,
        items: vec!["apples".to_string(), "oranges".to_string()],
    };
    let receipt: OrderReceipt = client.call("save_order", &order).await?;
    info!("save_order -> {receipt:?}");

    client.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    match std::env::args().nth(1).as_deref() {
        Some("server") => run_server().await,
        Some("client") => run_client().await,
        _ => {
            eprintln!("usage: order_service <server|client>");
            std::process::exit(2);
        }
    }
}
