use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::http::connection::Connection;
use crate::server::ServerState;

pub async fn run(state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&state.config.listen_addr).await?;
    info!("Listening on {}", state.config.listen_addr);
    serve(listener, state).await
}

/// Accept loop. A failed accept is logged and the loop carries on.
pub async fn serve(listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("Accept failed: {}", e);
                continue;
            }
        };
        debug!("Accepted connection from {}", peer);

        let state = state.clone();
        tokio::spawn(async move {
            let conn = Connection::new(socket, peer.ip().to_string(), state);
            if let Err(e) = conn.run().await {
                warn!("Connection error from {}: {:#}", peer, e);
            }
        });
    }
}
