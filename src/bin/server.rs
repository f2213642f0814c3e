//! Distributed WebRTC signaling server.
//!
//! Every process is stateless apart from its local sockets: room membership
//! lives in the shared Redis store, so several instances can run behind a
//! load balancer against the same Redis database.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin palava-machine
//! cargo run --bin palava-machine -- --port 4233 --redis-url redis://127.0.0.1:6379/0
//! ```

use std::sync::Arc;

use clap::Parser;
use palava_machine::{
    common::{
        logger::setup_logger,
        time::{Clock, SystemClock},
    },
    domain::RoomStore,
    infrastructure::{RedisRoomStore, SocketRegistry},
    ui::Server,
    usecase::{JoinRoomUseCase, LeaveRoomUseCase, SendToPeerUseCase, UpdateStatusUseCase},
};

#[derive(Parser, Debug)]
#[command(name = "palava-machine")]
#[command(about = "Distributed WebRTC signaling server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "4233")]
    port: u16,

    /// Redis URL holding the shared room state
    #[arg(short = 'r', long, default_value = "redis://127.0.0.1:6379/0")]
    redis_url: String,

    /// Grace period in seconds between the shutdown notice and closing sockets
    #[arg(short = 's', long, default_value = "3")]
    shutdown_timeout: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // Initialize dependencies in order:
    // 1. Shared room store
    // 2. Local connection registry
    // 3. UseCases
    // 4. Server

    // 1. Connect the shared room store
    let store: Arc<dyn RoomStore> = match RedisRoomStore::connect(&args.redis_url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("Could not connect to Redis server: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!("Connected to shared room store at {}", args.redis_url);

    // 2. Create the local connection registry
    let registry = Arc::new(SocketRegistry::new());

    // 3. Create UseCases
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let join_room_usecase = Arc::new(JoinRoomUseCase::new(store.clone(), clock.clone()));
    let leave_room_usecase = Arc::new(LeaveRoomUseCase::new(store.clone(), clock.clone()));
    let update_status_usecase = Arc::new(UpdateStatusUseCase::new(store.clone()));
    let send_to_peer_usecase = Arc::new(SendToPeerUseCase::new(store.clone()));

    // 4. Create and run the server
    let server = Server::new(
        join_room_usecase,
        leave_room_usecase,
        update_status_usecase,
        send_to_peer_usecase,
        registry,
        store,
        args.shutdown_timeout,
    );
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
