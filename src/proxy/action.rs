//! The API action whitelist and the backend RPC envelope.
//!
//! [`ApiAction`] is the closed set of RPC actions the gateway will
//! forward. Anything else is answered with `NOT_FOUND` before the backend
//! is contacted. [`parse_call`] turns an inbound API request into an
//! [`ApiCall`]; [`RpcRequest`] is what actually goes upstream.

use axum::http::Method;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ErrorCode, GatewayError};
use crate::routing::Query;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiAction {
    ListEvents,
    GetEvent,
    GetPublicBundle,
    GetDisplayBundle,
    GetPosterBundle,
    GetSharedReport,
    GetConfig,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    LogEvents,
    CreateShortlink,
}

impl ApiAction {
    pub const ALL: [Self; 12] = [
        Self::ListEvents,
        Self::GetEvent,
        Self::GetPublicBundle,
        Self::GetDisplayBundle,
        Self::GetPosterBundle,
        Self::GetSharedReport,
        Self::GetConfig,
        Self::CreateEvent,
        Self::UpdateEvent,
        Self::DeleteEvent,
        Self::LogEvents,
        Self::CreateShortlink,
    ];

    /// Wire name expected by the backend.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ListEvents => "listEvents",
            Self::GetEvent => "getEvent",
            Self::GetPublicBundle => "getPublicBundle",
            Self::GetDisplayBundle => "getDisplayBundle",
            Self::GetPosterBundle => "getPosterBundle",
            Self::GetSharedReport => "getSharedReport",
            Self::GetConfig => "getConfig",
            Self::CreateEvent => "createEvent",
            Self::UpdateEvent => "updateEvent",
            Self::DeleteEvent => "deleteEvent",
            Self::LogEvents => "logEvents",
            Self::CreateShortlink => "createShortlink",
        }
    }

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.name() == name)
    }

    /// Mutating actions require the brand's admin key and a POST.
    #[must_use]
    pub const fn is_mutating(self) -> bool {
        match self {
            Self::ListEvents
            | Self::GetEvent
            | Self::GetPublicBundle
            | Self::GetDisplayBundle
            | Self::GetPosterBundle
            | Self::GetSharedReport
            | Self::GetConfig => false,
            Self::CreateEvent
            | Self::UpdateEvent
            | Self::DeleteEvent
            | Self::LogEvents
            | Self::CreateShortlink => true,
        }
    }
}

impl std::fmt::Display for ApiAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated inbound API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub action: ApiAction,
    pub admin_key: Option<String>,
    pub payload: Value,
}

/// The backend RPC request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcRequest<'a> {
    pub action: &'static str,
    pub brand_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_key: Option<&'a str>,
    pub payload: &'a Value,
}

/// Keys that steer the gateway itself and are never part of a payload.
const ENVELOPE_KEYS: &[&str] = &["action", "adminKey", "brandId", "brand", "tenant", "p", "page"];

/// Build an [`ApiCall`] from the request.
///
/// The action comes from the body's `action` field, then the
/// `/api/<action>` path segment. POST bodies are JSON: either
/// `{action?, adminKey?, payload}` or a flat object whose non-envelope
/// fields become the payload. GET calls take their payload from the
/// query string and may only invoke read-only actions.
pub fn parse_call(
    method: &Method,
    path_action: Option<&str>,
    body: &[u8],
    query: &Query,
) -> Result<ApiCall, GatewayError> {
    let mut object = if *method == Method::POST {
        parse_body(body)?
    } else {
        query_object(query)
    };

    let body_action = match object.remove("action") {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(GatewayError::new(
                ErrorCode::BadInput,
                "'action' must be a string",
            ))
        }
    };

    let name = body_action
        .as_deref()
        .or(path_action)
        .ok_or_else(|| GatewayError::new(ErrorCode::BadInput, "no API action given"))?;

    let action = ApiAction::parse(name).ok_or_else(|| {
        GatewayError::new(ErrorCode::NotFound, format!("unknown API action '{}'", truncate(name, 64)))
    })?;

    if action.is_mutating() && *method != Method::POST {
        return Err(GatewayError::new(
            ErrorCode::BadInput,
            format!("'{action}' requires POST"),
        ));
    }

    let admin_key = match object.remove("adminKey") {
        Some(Value::String(s)) => Some(s),
        _ => None,
    };

    let payload = match object.remove("payload") {
        Some(payload) => payload,
        None => {
            object.retain(|k, _| !ENVELOPE_KEYS.contains(&k.as_str()));
            Value::Object(object)
        }
    };

    Ok(ApiCall {
        action,
        admin_key,
        payload,
    })
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(GatewayError::new(
            ErrorCode::BadInput,
            "request body must be a JSON object",
        )),
        Err(e) => Err(GatewayError::new(
            ErrorCode::BadInput,
            format!("malformed JSON body: {e}"),
        )),
    }
}

fn query_object(query: &Query) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in query.iter() {
        if !k.is_empty() {
            map.insert(k.to_string(), Value::String(v.to_string()));
        }
    }
    map
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(path_action: Option<&str>, body: &str) -> Result<ApiCall, GatewayError> {
        parse_call(&Method::POST, path_action, body.as_bytes(), &Query::default())
    }

    #[test]
    fn every_action_round_trips_its_name() {
        for action in ApiAction::ALL {
            assert_eq!(ApiAction::parse(action.name()), Some(action));
        }
    }

    #[test]
    fn unknown_action_is_not_found() {
        let err = post(Some("list"), "").unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = post(Some("listEvents"), r#"{"action":"dropTables"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn body_action_overrides_path() {
        let call = post(Some("listEvents"), r#"{"action":"getEvent","payload":{"id":"e1"}}"#)
            .unwrap();
        assert_eq!(call.action, ApiAction::GetEvent);
        assert_eq!(call.payload, json!({"id": "e1"}));
    }

    #[test]
    fn flat_body_becomes_payload() {
        let call = post(
            Some("createEvent"),
            r#"{"adminKey":"k","brandId":"x","name":"Gala","date":"2026-01-01"}"#,
        )
        .unwrap();
        assert_eq!(call.admin_key.as_deref(), Some("k"));
        assert_eq!(call.payload, json!({"name": "Gala", "date": "2026-01-01"}));
    }

    #[test]
    fn malformed_body_is_bad_input() {
        assert_eq!(post(Some("listEvents"), "{nope").unwrap_err().code, ErrorCode::BadInput);
        assert_eq!(post(Some("listEvents"), "[1,2]").unwrap_err().code, ErrorCode::BadInput);
    }

    #[test]
    fn missing_action_is_bad_input() {
        assert_eq!(post(None, "{}").unwrap_err().code, ErrorCode::BadInput);
    }

    #[test]
    fn get_takes_payload_from_query() {
        let query = Query::parse(Some("id=e1&brand=abc"));
        let call = parse_call(&Method::GET, Some("getEvent"), b"", &query).unwrap();
        assert_eq!(call.payload, json!({"id": "e1"}));
    }

    #[test]
    fn get_cannot_mutate() {
        let err = parse_call(&Method::GET, Some("deleteEvent"), b"", &Query::default())
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadInput);
    }

    #[test]
    fn rpc_request_omits_missing_admin_key() {
        let payload = json!({});
        let req = RpcRequest {
            action: ApiAction::ListEvents.name(),
            brand_id: "abc",
            admin_key: None,
            payload: &payload,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, json!({"action": "listEvents", "brandId": "abc", "payload": {}}));
    }
}
