//! Request body normalization.
//!
//! JSON, URL-encoded forms and plain text carrying JSON all collapse into a
//! single `serde_json::Value` before a handler sees them.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid form body: {0}")]
    Form(String),
    #[error("failed to read body: {0}")]
    Read(String),
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

pub fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// Turn a raw body into a JSON value according to its content type.
///
/// Empty bodies and unrecognised content types produce an empty object.
pub fn normalize_body(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, BodyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    let media = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    match media.as_str() {
        "application/json" | "text/plain" => Ok(serde_json::from_slice(bytes)?),
        m if m.ends_with("+json") => Ok(serde_json::from_slice(bytes)?),
        "application/x-www-form-urlencoded" => parse_form(bytes),
        _ => Ok(Value::Object(Map::new())),
    }
}

fn parse_form(bytes: &[u8]) -> Result<Value, BodyError> {
    let pairs: Vec<(String, String)> =
        serde_urlencoded::from_bytes(bytes).map_err(|e| BodyError::Form(e.to_string()))?;

    let mut root = Value::Object(Map::new());
    for (key, value) in pairs {
        let path = split_key(&key);
        insert_at(&mut root, &path, value, &key)?;
    }
    Ok(root)
}

/// Bracket segments expanded per key. Anything deeper stays as one literal
/// segment, the way `qs` treats it.
const MAX_FORM_DEPTH: usize = 5;

/// `a[b][]` -> `["a", "b", ""]`. Keys that are not well-formed stay whole.
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 {
        return vec![key.to_string()];
    }

    let mut path = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        if path.len() > MAX_FORM_DEPTH {
            path.push(rest.to_string());
            return path;
        }
        let Some(close) = stripped.find(']') else {
            return vec![key.to_string()];
        };
        path.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    if !rest.is_empty() {
        return vec![key.to_string()];
    }
    path
}

fn insert_at(target: &mut Value, path: &[String], value: String, key: &str) -> Result<(), BodyError> {
    let Some((segment, rest)) = path.split_first() else {
        *target = match target.take() {
            Value::Null => Value::String(value),
            Value::Array(mut items) => {
                items.push(Value::String(value));
                Value::Array(items)
            }
            first @ Value::String(_) => Value::Array(vec![first, Value::String(value)]),
            _ => return Err(BodyError::Form(format!("conflicting values for `{key}`"))),
        };
        return Ok(());
    };

    if segment.is_empty() {
        if target.is_null() {
            *target = Value::Array(Vec::new());
        }
        let Value::Array(items) = target else {
            return Err(BodyError::Form(format!("conflicting values for `{key}`")));
        };
        items.push(Value::Null);
        let last = items.len() - 1;
        return insert_at(&mut items[last], rest, value, key);
    }

    if target.is_null() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(map) = target else {
        return Err(BodyError::Form(format!("conflicting values for `{key}`")));
    };
    let slot = map.entry(segment.clone()).or_insert(Value::Null);
    insert_at(slot, rest, value, key)
}

/// Extractor yielding the normalized body of any request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReqBody(pub Value);

impl ReqBody {
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, BodyError> {
        Ok(serde_json::from_value(self.0)?)
    }
}

impl<S> FromRequest<S> for ReqBody
where
    S: Send + Sync,
{
    type Rejection = BodyError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = content_type(req.headers()).map(str::to_owned);
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| BodyError::Read(e.body_text()))?;
        normalize_body(content_type.as_deref(), &bytes).map(ReqBody)
    }
}

/// Field deserializers that take numbers either as JSON numbers or as the
/// strings a form body carries.
///
/// Use with `#[serde(default, deserialize_with = "...")]`.
pub mod lenient {
    use std::{fmt::Display, str::FromStr};

    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText<T> {
        Number(T),
        Text(String),
    }

    fn resolve<T, E>(value: NumberOrText<T>) -> Result<T, E>
    where
        T: FromStr,
        T::Err: Display,
        E: Error,
    {
        match value {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(text) => text
                .trim()
                .parse()
                .map_err(|e| E::custom(format!("invalid number `{text}`: {e}"))),
        }
    }

    pub fn number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        Option::<NumberOrText<T>>::deserialize(deserializer)?
            .map(resolve)
            .transpose()
    }

    pub fn numbers<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        Vec::<NumberOrText<T>>::deserialize(deserializer)?
            .into_iter()
            .map(resolve)
            .collect()
    }
}
