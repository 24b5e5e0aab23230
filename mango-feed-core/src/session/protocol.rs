//! JSON-RPC frames for Solana account subscriptions
//!
//! Outbound:
//!
//! ```text
//! {"jsonrpc":"2.0","id":n,  "method":"accountSubscribe",  "params":[<base58>,{"encoding":"base64","commitment":c}]}
//! {"jsonrpc":"2.0","id":n+1,"method":"accountUnsubscribe","params":[<server id>]}
//! ```
//!
//! Inbound frames are either a notification (`method` plus
//! `params.subscription`) or a response to whatever request is in flight.
//! Responses are matched positionally; the echoed `id` is only checked for
//! logging.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::codec::base64_decode;
use crate::config::Commitment;
use crate::core::errors::ProtocolError;
use crate::core::PublicKey;

pub const SUBSCRIBE_METHOD: &str = "accountSubscribe";
pub const UNSUBSCRIBE_METHOD: &str = "accountUnsubscribe";
pub const NOTIFICATION_METHOD: &str = "accountNotification";

const ACCOUNT_ENCODING: &str = "base64";

/// Request id of the subscribe for a local subscription id
#[inline]
pub const fn subscribe_request_id(local_id: u64) -> u64 {
    local_id
}

/// Request id of the unsubscribe for a local subscription id
#[inline]
pub const fn unsubscribe_request_id(local_id: u64) -> u64 {
    local_id + 1
}

pub fn subscribe_request(local_id: u64, account: &PublicKey, commitment: Commitment) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": subscribe_request_id(local_id),
        "method": SUBSCRIBE_METHOD,
        "params": [
            account.to_base58(),
            { "encoding": ACCOUNT_ENCODING, "commitment": commitment.as_str() }
        ],
    })
    .to_string()
}

pub fn unsubscribe_request(local_id: u64, server_id: u64) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": unsubscribe_request_id(local_id),
        "method": UNSUBSCRIBE_METHOD,
        "params": [server_id],
    })
    .to_string()
}

/// Account data pushed for an active subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountNotification {
    /// Server-assigned subscription id
    pub subscription: u64,
    /// Slot the account state was observed at
    pub slot: u64,
    /// Raw account bytes, base64-decoded
    pub data: Vec<u8>,
}

/// Response to a subscribe or unsubscribe request
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResponse {
    pub id: Option<u64>,
    pub result: Option<Value>,
    /// Server error message, if the response carried one
    pub error: Option<String>,
    /// Frame text as received, kept for error reporting
    pub raw: String,
}

impl RpcResponse {
    /// Server subscription id, present only when `result` is a non-negative integer
    pub fn subscription_id(&self) -> Option<u64> {
        self.result.as_ref().and_then(Value::as_u64)
    }

    /// True only for `"result": true`
    pub fn unsubscribe_accepted(&self) -> bool {
        matches!(self.result, Some(Value::Bool(true)))
    }
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Notification(AccountNotification),
    Response(RpcResponse),
}

#[derive(Deserialize)]
struct NotificationParams {
    subscription: u64,
    result: NotificationResult,
}

#[derive(Deserialize)]
struct NotificationResult {
    context: NotificationContext,
    value: AccountValue,
}

#[derive(Deserialize)]
struct NotificationContext {
    slot: u64,
}

#[derive(Deserialize)]
struct AccountValue {
    data: (String, String),
}

/// Classify and decode one text frame
pub fn parse_frame(text: &str) -> Result<Inbound, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError::Malformed {
        reason: e.to_string(),
    })?;

    if !value.is_object() {
        return Err(ProtocolError::Malformed {
            reason: "frame is not a JSON object".to_string(),
        });
    }

    if is_notification(&value) {
        return parse_notification(value).map(Inbound::Notification);
    }

    Ok(Inbound::Response(RpcResponse {
        id: value.get("id").and_then(Value::as_u64),
        result: value.get("result").cloned(),
        error: value
            .get("error")
            .map(|e| match e.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None => e.to_string(),
            }),
        raw: text.to_string(),
    }))
}

fn is_notification(value: &Value) -> bool {
    value.get("method").is_some()
        && value
            .get("params")
            .and_then(|p| p.get("subscription"))
            .is_some()
}

/// True if the text is JSON shaped like a notification, decodable or not
pub fn is_notification_frame(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .map(|v| is_notification(&v))
        .unwrap_or(false)
}

fn parse_notification(mut value: Value) -> Result<AccountNotification, ProtocolError> {
    let params = value
        .get_mut("params")
        .map(Value::take)
        .unwrap_or(Value::Null);

    let params: NotificationParams =
        serde_json::from_value(params).map_err(|e| ProtocolError::Malformed {
            reason: format!("notification params: {}", e),
        })?;

    let (payload, encoding) = params.result.value.data;
    if encoding != ACCOUNT_ENCODING {
        return Err(ProtocolError::UnsupportedEncoding(encoding));
    }

    Ok(AccountNotification {
        subscription: params.subscription,
        slot: params.result.context.slot,
        data: base64_decode(&payload)?,
    })
}

/// Build a notification frame the way the server does
pub fn notification_frame(subscription: u64, slot: u64, data: &[u8]) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": NOTIFICATION_METHOD,
        "params": {
            "subscription": subscription,
            "result": {
                "context": { "slot": slot },
                "value": {
                    "data": [crate::codec::base64_encode(data), ACCOUNT_ENCODING],
                    "executable": false,
                    "lamports": 0,
                    "owner": "",
                    "rentEpoch": 0
                }
            }
        }
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUP: &str = "98pjRuQjK3qA6gXts96PqZT4Ze5QmnCmt3QYjhbUSPue";

    #[test]
    fn test_subscribe_request_shape() {
        let key = PublicKey::from_base58(GROUP).unwrap();
        let frame = subscribe_request(4, &key, Commitment::Processed);
        let v: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["id"], 4);
        assert_eq!(v["method"], "accountSubscribe");
        assert_eq!(v["params"][0], GROUP);
        assert_eq!(v["params"][1]["encoding"], "base64");
        assert_eq!(v["params"][1]["commitment"], "processed");
    }

    #[test]
    fn test_unsubscribe_request_uses_next_id() {
        let frame = unsubscribe_request(4, 23_784);
        let v: Value = serde_json::from_str(&frame).unwrap();

        assert_eq!(v["id"], 5);
        assert_eq!(v["method"], "accountUnsubscribe");
        assert_eq!(v["params"], json!([23_784]));
    }

    #[test]
    fn test_parse_subscribe_success() {
        let inbound = parse_frame(r#"{"jsonrpc":"2.0","result":23784,"id":0}"#).unwrap();
        let Inbound::Response(resp) = inbound else {
            panic!("expected response");
        };
        assert_eq!(resp.id, Some(0));
        assert_eq!(resp.subscription_id(), Some(23_784));
    }

    #[test]
    fn test_parse_subscribe_failure_has_no_id() {
        let frame = r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid param"},"id":2}"#;
        let Inbound::Response(resp) = parse_frame(frame).unwrap() else {
            panic!("expected response");
        };
        assert_eq!(resp.subscription_id(), None);
        assert_eq!(resp.error.as_deref(), Some("Invalid param"));
        assert_eq!(resp.raw, frame);
    }

    #[test]
    fn test_non_integer_result_is_not_a_subscription() {
        let Inbound::Response(resp) = parse_frame(r#"{"result":null,"id":0}"#).unwrap() else {
            panic!("expected response");
        };
        assert_eq!(resp.subscription_id(), None);

        let Inbound::Response(resp) = parse_frame(r#"{"result":-1,"id":0}"#).unwrap() else {
            panic!("expected response");
        };
        assert_eq!(resp.subscription_id(), None);
    }

    #[test]
    fn test_unsubscribe_result_truthiness() {
        let parse = |text: &str| match parse_frame(text).unwrap() {
            Inbound::Response(r) => r.unsubscribe_accepted(),
            Inbound::Notification(_) => panic!("expected response"),
        };
        assert!(parse(r#"{"result":true,"id":1}"#));
        assert!(!parse(r#"{"result":false,"id":1}"#));
        assert!(!parse(r#"{"id":1}"#));
    }

    #[test]
    fn test_parse_notification() {
        let frame = notification_frame(7, 1234, &[1, 2, 3, 250]);
        let Inbound::Notification(n) = parse_frame(&frame).unwrap() else {
            panic!("expected notification");
        };
        assert_eq!(n.subscription, 7);
        assert_eq!(n.slot, 1234);
        assert_eq!(n.data, vec![1, 2, 3, 250]);
    }

    #[test]
    fn test_notification_with_wrong_encoding() {
        let frame = r#"{"method":"accountNotification","params":{"subscription":1,"result":{"context":{"slot":1},"value":{"data":["abc","base58"]}}}}"#;
        assert_eq!(
            parse_frame(frame),
            Err(ProtocolError::UnsupportedEncoding("base58".to_string()))
        );
    }

    #[test]
    fn test_notification_with_bad_base64() {
        let frame = r#"{"method":"accountNotification","params":{"subscription":1,"result":{"context":{"slot":1},"value":{"data":["!!!","base64"]}}}}"#;
        assert!(matches!(parse_frame(frame), Err(ProtocolError::Payload(_))));
    }

    #[test]
    fn test_notification_missing_value() {
        let frame = r#"{"method":"accountNotification","params":{"subscription":1,"result":{"context":{"slot":1}}}}"#;
        assert!(matches!(
            parse_frame(frame),
            Err(ProtocolError::Malformed { .. })
        ));
    }

    #[test]
    fn test_is_notification_frame() {
        assert!(is_notification_frame(&notification_frame(1, 1, &[])));
        let bad = r#"{"method":"accountNotification","params":{"subscription":1}}"#;
        assert!(is_notification_frame(bad));
        assert!(!is_notification_frame(r#"{"result":1,"id":0}"#));
        assert!(!is_notification_frame("garbage"));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            parse_frame("not json"),
            Err(ProtocolError::Malformed { .. })
        ));
        assert!(matches!(
            parse_frame("[1,2]"),
            Err(ProtocolError::Malformed { .. })
        ));
    }
}
