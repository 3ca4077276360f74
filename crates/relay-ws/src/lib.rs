//! WebSocket transport: accepts subscribers, hands each a duplex channel,
//! and routes inbound command/network frames to the engine. Replies go
//! only to the requesting client; broadcast frames arrive through the
//! registry channel like everything else, so each connection has exactly
//! one writer.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use relay_core::registry::ClientSender;
use relay_core::Hub;
use relay_proto::telemetry::NetworkType;
use relay_proto::wire::{ClientMessage, ServerMessage};

pub async fn serve(addr: SocketAddr, hub: Arc<Hub>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("listening on ws://{addr}");

    loop {
        let (stream, peer) = listener.accept().await.context("accept")?;
        let hub = Arc::clone(&hub);
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, hub).await {
                warn!("client {peer} connection ended: {e:#}");
            }
        });
    }
}

async fn handle_client(stream: TcpStream, hub: Arc<Hub>) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .context("websocket handshake")?;
    let (mut sink, mut inbound) = ws.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    greet(&hub, &tx);
    let id = hub.registry.register(tx.clone());

    // sole writer for this connection; broadcast and replies both feed it
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(frame) = inbound.next().await {
        match frame {
            Ok(Message::Text(text)) => process_text(&hub, &tx, text.as_str()),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    hub.registry.unregister(id);
    writer.abort();
    Ok(())
}

/// First frames a new subscriber sees: feature summary, then the current
/// full snapshot.
fn greet(hub: &Hub, tx: &ClientSender) {
    queue_reply(
        tx,
        &ServerMessage::SystemInfo {
            features: hub.features,
            network: hub.network.info(),
        },
    );
    queue_reply(
        tx,
        &ServerMessage::Initial {
            data: hub.store.snapshot(),
        },
    );
}

fn process_text(hub: &Hub, reply: &ClientSender, text: &str) {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("invalid client message: {e}");
            return;
        }
    };

    match msg {
        ClientMessage::Command { command, params } => {
            let success = hub.dispatcher.dispatch(&command, &params);
            queue_reply(reply, &ServerMessage::CommandResponse { command, success });
        }
        ClientMessage::NetworkSwitch { network } => match NetworkType::parse(&network) {
            Some(t) => {
                hub.network.switch(t);
                queue_reply(
                    reply,
                    &ServerMessage::NetworkUpdate {
                        network: hub.network.info(),
                    },
                );
            }
            None => warn!("ignoring switch to unknown network {network:?}"),
        },
    }
}

fn queue_reply(tx: &ClientSender, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(text) => {
            // a closed channel just means the client is already gone
            let _ = tx.send(text);
        }
        Err(e) => warn!("reply serialization failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::SharedLink;
    use relay_link::mock::MockLink;
    use relay_proto::wire::FeatureSet;
    use std::sync::Mutex;

    fn test_hub() -> Arc<Hub> {
        let link: SharedLink = Arc::new(Mutex::new(Box::new(MockLink::new())));
        Arc::new(Hub::new(
            link,
            NetworkType::Wifi,
            FeatureSet {
                mavlink: false,
                zerotier_vpn: false,
                network_simulation: true,
                video_streaming: false,
            },
        ))
    }

    fn recv_json(rx: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
        serde_json::from_str(&rx.try_recv().expect("queued frame")).unwrap()
    }

    #[test]
    fn greeting_sends_system_info_then_initial() {
        let hub = test_hub();
        let (tx, mut rx) = mpsc::unbounded_channel();
        greet(&hub, &tx);

        let first = recv_json(&mut rx);
        assert_eq!(first["type"], "system_info");
        assert_eq!(first["network"]["type"], "WiFi");
        assert_eq!(first["features"]["network_simulation"], true);
        assert_eq!(first["features"]["zerotier_vpn"], false);
        assert_eq!(first["features"]["video_streaming"], false);

        let second = recv_json(&mut rx);
        assert_eq!(second["type"], "initial");
        assert_eq!(second["data"]["connected"], false);
    }

    #[test]
    fn command_frame_gets_a_private_ack() {
        let hub = test_hub();
        let (tx, mut rx) = mpsc::unbounded_channel();

        process_text(&hub, &tx, r#"{"type":"command","command":"LAND"}"#);
        let ack = recv_json(&mut rx);
        assert_eq!(ack["type"], "command_response");
        assert_eq!(ack["command"], "LAND");
        assert_eq!(ack["success"], true);

        process_text(&hub, &tx, r#"{"type":"command","command":"WARP"}"#);
        let ack = recv_json(&mut rx);
        assert_eq!(ack["success"], false);
    }

    #[test]
    fn network_switch_updates_profile_and_replies() {
        let hub = test_hub();
        let (tx, mut rx) = mpsc::unbounded_channel();

        process_text(&hub, &tx, r#"{"type":"network_switch","network":"5G"}"#);
        assert_eq!(hub.network.info().network_type, NetworkType::FiveG);

        let update = recv_json(&mut rx);
        assert_eq!(update["type"], "network_update");
        assert_eq!(update["network"]["type"], "5G");
    }

    #[test]
    fn malformed_frames_are_dropped_silently() {
        let hub = test_hub();
        let (tx, mut rx) = mpsc::unbounded_channel();

        process_text(&hub, &tx, "not json");
        process_text(&hub, &tx, r#"{"type":"video_start"}"#);
        process_text(&hub, &tx, r#"{"type":"network_switch","network":"Tin Cans"}"#);
        assert!(rx.try_recv().is_err());
    }
}
