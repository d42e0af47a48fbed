// src/stream/event.rs
//
// Decoding of the PBX push channel payloads. The channel carries JSON
// envelopes `{type, msg}` where `msg` is itself a JSON document.

use serde::Deserialize;
use serde_json::json;

use crate::error::BillingError;

/// Envelope type of the subscription acknowledgement.
pub const SUBSCRIPTION_ACK: i32 = 10000;
/// Envelope type of call-status updates (participant list with statuses).
pub const TOPIC_CALL_STATUS: i32 = 30011;
/// Envelope type of call reports (the PBX's end-of-call CDR).
pub const TOPIC_CALL_REPORT: i32 = 30012;

/// Extension-leg status meaning the call was picked up.
pub const STATUS_ANSWERED: &str = "ANSWERED";

/// Body of the subscription request sent right after connecting.
pub fn subscription_request() -> String {
    json!({ "topic_list": [TOPIC_CALL_STATUS, TOPIC_CALL_REPORT] }).to_string()
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: i32,
    #[serde(default)]
    msg: Option<String>,
}

/// The internal-extension leg of a call.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionLeg {
    pub number: String,
    #[serde(default)]
    pub member_status: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

/// The dialed-out leg of a call. `to` is the destination the engine
/// bills against; `number` is only used for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundLeg {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallMember {
    #[serde(default)]
    pub extension: Option<ExtensionLeg>,
    #[serde(default)]
    pub outbound: Option<OutboundLeg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusUpdate {
    pub call_id: String,
    #[serde(default)]
    pub members: Vec<CallMember>,
}

impl CallStatusUpdate {
    pub fn extension_leg(&self) -> Option<&ExtensionLeg> {
        self.members.iter().find_map(|m| m.extension.as_ref())
    }

    pub fn outbound_leg(&self) -> Option<&OutboundLeg> {
        self.members.iter().find_map(|m| m.outbound.as_ref())
    }
}

/// The PBX's authoritative end-of-call record.
#[derive(Debug, Clone, Deserialize)]
pub struct CallReport {
    pub call_id: String,
    pub call_from: String,
    #[serde(default)]
    pub call_to: Option<String>,
    #[serde(default)]
    pub call_duration: Option<i64>,
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    SubscriptionAck,
    CallStatus(CallStatusUpdate),
    CallReport(CallReport),
    Unknown(i32),
}

pub fn decode(text: &str) -> Result<StreamEvent, BillingError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| BillingError::Decode(e.to_string()))?;

    let msg = |kind: i32| {
        envelope
            .msg
            .as_deref()
            .ok_or_else(|| BillingError::Decode(format!("event {} without msg body", kind)))
    };

    match envelope.kind {
        SUBSCRIPTION_ACK => Ok(StreamEvent::SubscriptionAck),
        TOPIC_CALL_STATUS => {
            let update: CallStatusUpdate = serde_json::from_str(msg(TOPIC_CALL_STATUS)?)
                .map_err(|e| BillingError::Decode(e.to_string()))?;
            Ok(StreamEvent::CallStatus(update))
        }
        TOPIC_CALL_REPORT => {
            let report: CallReport = serde_json::from_str(msg(TOPIC_CALL_REPORT)?)
                .map_err(|e| BillingError::Decode(e.to_string()))?;
            Ok(StreamEvent::CallReport(report))
        }
        other => Ok(StreamEvent::Unknown(other)),
    }
}
