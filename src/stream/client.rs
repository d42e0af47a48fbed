// src/stream/client.rs
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector};
use tracing::{error, info, warn};

use crate::error::BillingError;
use crate::pbx::{PbxEndpoint, TokenManager};
use crate::services::CallSessionEngine;
use crate::store::ConfigurationProvider;
use crate::stream::event::{self, StreamEvent, STATUS_ANSWERED};

/// Long-lived subscriber to the PBX push notification channel. Decoded
/// events are routed to the call session engine; the connection is
/// re-established with a fixed delay after any failure, indefinitely.
pub struct EventStreamClient {
    tokens: Arc<TokenManager>,
    configs: Arc<dyn ConfigurationProvider>,
    engine: Arc<CallSessionEngine>,
    endpoint: PbxEndpoint,
    reconnect_delay: Duration,
}

impl EventStreamClient {
    pub fn new(
        tokens: Arc<TokenManager>,
        configs: Arc<dyn ConfigurationProvider>,
        engine: Arc<CallSessionEngine>,
        endpoint: PbxEndpoint,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            tokens,
            configs,
            engine,
            endpoint,
            reconnect_delay,
        }
    }

    /// Runs forever. The same retry policy applies to the initial connect
    /// and to reconnects after a dropped stream: the PBX link is
    /// long-lived infrastructure and must come back without a restart.
    pub async fn run(self: Arc<Self>) {
        loop {
            match self.connect_and_listen().await {
                Ok(()) => info!("PBX event stream closed by remote"),
                Err(e) => error!("PBX event stream error: {}", e),
            }

            warn!(
                "Reconnecting to PBX event stream in {}s...",
                self.reconnect_delay.as_secs()
            );
            sleep(self.reconnect_delay).await;
        }
    }

    /// One connection lifetime: authenticate, subscribe, consume until
    /// the stream drops.
    pub async fn connect_and_listen(&self) -> Result<(), BillingError> {
        let token = self.tokens.ensure_valid_token().await?;
        let config = self
            .configs
            .find_active()
            .await?
            .ok_or(BillingError::ConfigurationMissing)?;

        let url = self.endpoint.subscribe_url(&config, &token);
        info!("Connecting to PBX event stream at {}:{}", config.ip, self.endpoint.port);

        // The PBX presents a self-signed certificate
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        let (ws, _) = connect_async_tls_with_config(
            url.as_str(),
            None,
            false,
            Some(Connector::NativeTls(tls)),
        )
        .await
        .map_err(|e| BillingError::Transport(e.to_string()))?;

        let (mut write, mut read) = ws.split();

        write
            .send(Message::Text(event::subscription_request()))
            .await
            .map_err(|e| BillingError::Transport(e.to_string()))?;

        info!("Connected to PBX event stream, subscription requested");

        // One consuming task: events are handled one at a time, in
        // arrival order.
        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => self.dispatch(&text).await,
                Ok(Message::Ping(payload)) => {
                    write
                        .send(Message::Pong(payload))
                        .await
                        .map_err(|e| BillingError::Transport(e.to_string()))?;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => return Err(BillingError::Transport(e.to_string())),
            }
        }

        Ok(())
    }

    /// Routes one raw frame. Nothing thrown past this point: one
    /// malformed or stale event must not take the stream consumer down.
    pub async fn dispatch(&self, text: &str) {
        match event::decode(text) {
            Ok(StreamEvent::SubscriptionAck) => {
                info!("PBX subscription confirmed");
            }
            Ok(StreamEvent::CallStatus(update)) => self.handle_call_status(update).await,
            Ok(StreamEvent::CallReport(report)) => {
                info!(
                    "Call report: {} from {} to {:?}, duration {:?}s",
                    report.call_id, report.call_from, report.call_to, report.call_duration
                );
                if let Err(e) = self
                    .engine
                    .end_call(&report.call_from, &report.call_id, report.call_to.as_deref())
                    .await
                {
                    error!("Failed to settle call {}: {}", report.call_id, e);
                }
            }
            Ok(StreamEvent::Unknown(kind)) => {
                warn!("Unknown PBX event kind: {}", kind);
            }
            Err(e) => {
                warn!("Discarding undecodable PBX event: {}", e);
            }
        }
    }

    async fn handle_call_status(&self, update: crate::stream::event::CallStatusUpdate) {
        let (Some(extension), Some(outbound)) = (update.extension_leg(), update.outbound_leg())
        else {
            warn!("Call {} has an incomplete member list, discarding", update.call_id);
            return;
        };

        match extension.member_status.as_deref() {
            Some(STATUS_ANSWERED) => {
                let Some(channel_id) = extension.channel_id.as_deref() else {
                    warn!("Answered call {} without a channel id, discarding", update.call_id);
                    return;
                };

                info!(
                    "Call answered on extension {} to {:?} (call {})",
                    extension.number, outbound.to, update.call_id
                );

                if let Err(e) = self
                    .engine
                    .start_call(
                        &extension.number,
                        &update.call_id,
                        channel_id,
                        outbound.to.as_deref(),
                    )
                    .await
                {
                    error!("Failed to open session for call {}: {}", update.call_id, e);
                }
            }
            Some("RING") | Some("ALERT") => {
                info!(
                    "Extension {} ringing towards {:?} (call {})",
                    extension.number, outbound.number, update.call_id
                );
            }
            _ => {}
        }
    }
}
