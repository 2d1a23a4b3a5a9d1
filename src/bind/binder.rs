//! Default argument satisfier.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::bind::{ArgValue, ArgumentSatisfier, BindingError};
use crate::codec::{CodecError, CodecRegistry};
use crate::http::{MediaType, Request};
use crate::routing::{Param, ParamSource, ParamType, RouteMatch};

/// Binds declared route parameters from the request head and body.
///
/// Unresolvable optional parameters are skipped; unresolvable required
/// ones stay unbound for the engine to report. Values that exist but do not
/// convert to the declared type fail immediately.
#[derive(Debug, Clone)]
pub struct RequestArgumentBinder {
    codecs: Arc<CodecRegistry>,
    max_body: usize,
}

impl RequestArgumentBinder {
    pub fn new(codecs: Arc<CodecRegistry>, max_body: usize) -> Self {
        Self { codecs, max_body }
    }

    async fn resolve(
        &self,
        param: &Param,
        request: &mut Request,
    ) -> Result<Option<ArgValue>, BindingError> {
        let name = param.name.as_str();
        let value = match param.source {
            // Template variables are bound when the route matches.
            ParamSource::Path => None,
            ParamSource::Query => match request.query().get_all(name) {
                [] => None,
                [single] => Some(ArgValue::Text(single.clone())),
                many => Some(ArgValue::Json(Value::Array(
                    many.iter().cloned().map(Value::String).collect(),
                ))),
            },
            ParamSource::Header => request
                .headers()
                .get(name)
                .map(|v| ArgValue::Text(v.to_string())),
            ParamSource::Cookie => request
                .cookies()
                .get(name)
                .map(|c| ArgValue::Text(c.value().to_string())),
            ParamSource::Body => decoded_body(&self.codecs, self.max_body, request)
                .await?
                .map(ArgValue::Json),
            ParamSource::RawBody => {
                let bytes = request.body_mut().buffer(self.max_body).await?;
                (!bytes.is_empty()).then_some(ArgValue::Bytes(bytes))
            }
            ParamSource::BodyStream => Some(ArgValue::Stream(request.body_mut().take()?)),
            ParamSource::BodyField => decoded_body(&self.codecs, self.max_body, request)
                .await?
                .and_then(|body| body.get(name).cloned())
                .map(field_value),
        };
        value.map(|v| convert(param, v)).transpose()
    }
}

#[async_trait]
impl ArgumentSatisfier for RequestArgumentBinder {
    async fn fulfill(
        &self,
        mut route_match: RouteMatch,
        request: &mut Request,
    ) -> Result<RouteMatch, BindingError> {
        let route = Arc::clone(route_match.route());
        for param in route.params() {
            if let Some(ArgValue::Text(text)) = route_match.arguments().value(&param.name) {
                // Path variables arrive as text; apply the declared type.
                let converted = convert(param, ArgValue::Text(text.clone()))?;
                route_match.arguments_mut().insert(param.name.clone(), converted);
                continue;
            }
            if route_match.arguments().contains(&param.name) {
                continue;
            }
            if let Some(value) = self.resolve(param, request).await? {
                trace!(param = %param.name, source = ?param.source, "argument bound");
                route_match.arguments_mut().insert(param.name.clone(), value);
            }
        }
        Ok(route_match)
    }
}

/// Decode the request body once per request, reusing an earlier result.
///
/// Returns `None` for an empty body. A missing `Content-Type` is read as
/// JSON.
pub(crate) async fn decoded_body(
    codecs: &CodecRegistry,
    max_body: usize,
    request: &mut Request,
) -> Result<Option<Value>, BindingError> {
    if let Some(value) = request.parsed_body() {
        return Ok(Some(value.clone()));
    }
    let media_type = request.head().content_type().unwrap_or_else(MediaType::json);
    let bytes = request.body_mut().buffer(max_body).await?;
    if bytes.is_empty() {
        return Ok(None);
    }
    let value = codecs.decode(&media_type, &bytes).map_err(|e| match e {
        CodecError::NoDecoder { media_type } => BindingError::UnsupportedMediaType { media_type },
        other => BindingError::Conversion {
            name: "body".to_string(),
            reason: other.to_string(),
        },
    })?;
    request.set_parsed_body(value.clone());
    Ok(Some(value))
}

/// Argument for a field pulled out of a structured body.
pub(crate) fn field_value(value: Value) -> ArgValue {
    match value {
        Value::String(text) => ArgValue::Text(text),
        other => ArgValue::Json(other),
    }
}

/// Apply the declared parameter type to a bound value.
pub(crate) fn convert(param: &Param, value: ArgValue) -> Result<ArgValue, BindingError> {
    match (param.ty, value) {
        (ParamType::String, value) => Ok(value),
        (ty, ArgValue::Text(text)) => convert_text(&param.name, ty, &text).map(ArgValue::Json),
        (ty, ArgValue::Json(Value::Array(items))) if ty != ParamType::Json => items
            .into_iter()
            .map(|item| match item {
                Value::String(text) => convert_text(&param.name, ty, &text),
                other => Ok(other),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|items| ArgValue::Json(Value::Array(items))),
        (_, value) => Ok(value),
    }
}

fn convert_text(name: &str, ty: ParamType, text: &str) -> Result<Value, BindingError> {
    let failed = |reason: String| BindingError::Conversion {
        name: name.to_string(),
        reason,
    };
    match ty {
        ParamType::String => Ok(Value::String(text.to_string())),
        ParamType::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| failed(format!("{text:?} is not an integer: {e}"))),
        ParamType::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .ok_or_else(|| failed(format!("{text:?} is not a number"))),
        ParamType::Boolean => text
            .trim()
            .parse::<bool>()
            .map(Value::Bool)
            .map_err(|_| failed(format!("{text:?} is not a boolean"))),
        ParamType::Json => {
            Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Outcome;
    use crate::routing::Route;
    use serde_json::json;

    fn binder() -> RequestArgumentBinder {
        RequestArgumentBinder::new(Arc::new(CodecRegistry::with_defaults()), 1024)
    }

    fn route_match(route: Route, variables: Vec<(&str, &str)>) -> RouteMatch {
        RouteMatch::with_variables(
            Arc::new(route),
            variables
                .into_iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn binds_head_sources() {
        let route = Route::get("/pets/{id}", |_| async { Ok(Outcome::Empty) })
            .param(Param::path("id").of(ParamType::Integer))
            .param(Param::query("tag"))
            .param(Param::header("x-api-key"))
            .param(Param::cookie("session"))
            .param(Param::query("limit").optional())
            .build()
            .unwrap();
        let mut request = Request::get("/pets/7?tag=a&tag=b")
            .header("X-Api-Key", "k")
            .header("Cookie", "session=s1")
            .build()
            .unwrap();

        let bound = binder()
            .fulfill(route_match(route, vec![("id", "7")]), &mut request)
            .await
            .unwrap();

        let args = bound.arguments();
        assert_eq!(args.get::<u64>("id").unwrap(), 7);
        assert_eq!(args.get::<Vec<String>>("tag").unwrap(), ["a", "b"]);
        assert_eq!(args.text("x-api-key"), Some("k"));
        assert_eq!(args.text("session"), Some("s1"));
        assert!(!args.contains("limit"));
        assert!(bound.is_fulfilled());
    }

    #[tokio::test]
    async fn bad_path_value_is_a_conversion_error() {
        let route = Route::get("/pets/{id}", |_| async { Ok(Outcome::Empty) })
            .param(Param::path("id").of(ParamType::Integer))
            .build()
            .unwrap();
        let mut request = Request::get("/pets/rex").build().unwrap();

        let result = binder()
            .fulfill(route_match(route, vec![("id", "rex")]), &mut request)
            .await;
        assert!(matches!(result, Err(BindingError::Conversion { ref name, .. }) if name == "id"));
    }

    #[tokio::test]
    async fn body_and_fields_share_one_decode() {
        let route = Route::post("/pets", |_| async { Ok(Outcome::Empty) })
            .param(Param::body("pet"))
            .param(Param::body_field("name"))
            .build()
            .unwrap();
        let mut request = Request::post("/pets")
            .json(&json!({"name": "Rex", "age": 3}))
            .build()
            .unwrap();

        let bound = binder()
            .fulfill(route_match(route, vec![]), &mut request)
            .await
            .unwrap();
        assert_eq!(bound.arguments().text("name"), Some("Rex"));
        assert_eq!(
            bound.arguments().get::<Value>("pet").unwrap(),
            json!({"name": "Rex", "age": 3})
        );
        assert!(request.parsed_body().is_some());
    }

    #[tokio::test]
    async fn unknown_content_type_is_unsupported() {
        let route = Route::post("/upload", |_| async { Ok(Outcome::Empty) })
            .param(Param::body("doc"))
            .build()
            .unwrap();
        let mut request = Request::post("/upload")
            .header("Content-Type", "application/xml")
            .body("<a/>")
            .build()
            .unwrap();

        let result = binder().fulfill(route_match(route, vec![]), &mut request).await;
        assert!(matches!(result, Err(BindingError::UnsupportedMediaType { .. })));
    }

    #[tokio::test]
    async fn stream_parameter_claims_the_body() {
        let route = Route::post("/raw", |_| async { Ok(Outcome::Empty) })
            .param(Param::body_stream("data"))
            .build()
            .unwrap();
        let mut request = Request::post("/raw").body("bytes").build().unwrap();

        let mut bound = binder()
            .fulfill(route_match(route, vec![]), &mut request)
            .await
            .unwrap();
        let mut stream = bound.arguments_mut().take_stream("data").unwrap();
        assert_eq!(stream.buffer(64).await.unwrap(), "bytes");
        assert!(request.body().is_claimed());
    }
}
