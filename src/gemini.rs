//! Gemini provider gateway.
//!
//! Builds the two `generateContent` request shapes this client needs and
//! unwraps their responses. There is deliberately no retry, caching, or
//! streaming here: one request out, one response back.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use crate::capabilities::{HttpRequest, HttpResponse, HttpResult};
use crate::conversation::QueryResult;
use crate::grounding::normalize;
use crate::image_edit::UploadedImage;
use crate::{ApiKey, AppError, ErrorKind, LatLon};

pub const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const MAPS_MODEL: &str = "gemini-2.5-flash";
pub const IMAGE_EDIT_MODEL: &str = "gemini-2.5-flash-image";

/// Shown when the provider answers without any text.
pub const NO_DETAILS_FALLBACK: &str = "No details found.";

const GATEWAY_TIMEOUT_MS: u64 = 60_000;

fn endpoint(api_key: &ApiKey, model: &str) -> String {
    format!(
        "{API_BASE}/models/{model}:generateContent?key={}",
        api_key.expose()
    )
}

fn require_key(api_key: Option<&ApiKey>) -> Result<&ApiKey, AppError> {
    api_key.ok_or_else(|| {
        AppError::new(
            ErrorKind::Authentication,
            "no Gemini API key configured in the environment",
        )
    })
}

/// Builds the grounded map query request. The location hint, when known,
/// rides in `toolConfig.retrievalConfig.latLng`, the one authoritative
/// construction for Maps grounding.
pub fn grounded_query_request(
    api_key: Option<&ApiKey>,
    query: &str,
    location: Option<LatLon>,
) -> Result<HttpRequest, AppError> {
    let api_key = require_key(api_key)?;

    let mut body = json!({
        "contents": [
            {
                "role": "user",
                "parts": [{ "text": query }],
            }
        ],
        "tools": [{ "googleMaps": {} }],
    });

    if let Some(location) = location {
        body["toolConfig"] = json!({
            "retrievalConfig": {
                "latLng": {
                    "latitude": location.lat,
                    "longitude": location.lon,
                }
            }
        });
    }

    let mut request = HttpRequest::post(endpoint(api_key, MAPS_MODEL))
        .map_err(provider_error)?
        .with_json_body(&body)
        .map_err(provider_error)?;
    request.timeout_ms = GATEWAY_TIMEOUT_MS;
    Ok(request)
}

/// Builds the image edit request: the photo as an inline part tagged with
/// its sniffed medium type, followed by the instruction text.
pub fn edit_image_request(
    api_key: Option<&ApiKey>,
    image: &UploadedImage,
    instruction: &str,
) -> Result<HttpRequest, AppError> {
    let api_key = require_key(api_key)?;

    let body = json!({
        "contents": [
            {
                "role": "user",
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": image.mime_type,
                            "data": BASE64.encode(&image.data),
                        }
                    },
                    { "text": instruction },
                ],
            }
        ],
    });

    let mut request = HttpRequest::post(endpoint(api_key, IMAGE_EDIT_MODEL))
        .map_err(provider_error)?
        .with_json_body(&body)
        .map_err(provider_error)?;
    request.timeout_ms = GATEWAY_TIMEOUT_MS;
    Ok(request)
}

/// Unwraps a grounded query response into answer text plus normalized
/// citations. Missing text falls back to a fixed placeholder; a missing
/// citation list is simply empty.
pub fn parse_grounded_response(result: &HttpResult) -> Result<QueryResult, AppError> {
    let payload = success_payload(result)?;

    let text = first_candidate(&payload)
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default();

    let answer_text = if text.trim().is_empty() {
        NO_DETAILS_FALLBACK.to_string()
    } else {
        text
    };

    let citations = first_candidate(&payload)
        .and_then(|candidate| candidate.get("groundingMetadata"))
        .and_then(|metadata| metadata.get("groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| normalize(chunks))
        .unwrap_or_default();

    Ok(QueryResult {
        answer_text,
        citations,
    })
}

/// Scans the response parts in order and returns the bytes of the first one
/// carrying inline image data.
pub fn parse_edited_image(result: &HttpResult) -> Result<Vec<u8>, AppError> {
    let payload = success_payload(result)?;

    let parts = first_candidate(&payload)
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array);

    if let Some(parts) = parts {
        for part in parts {
            let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
            if let Some(data) = inline
                .and_then(|inline| inline.get("data"))
                .and_then(Value::as_str)
            {
                return BASE64.decode(data).map_err(|e| {
                    AppError::new(
                        ErrorKind::Provider,
                        format!("inline image data is not valid base64: {e}"),
                    )
                });
            }
        }
    }

    Err(AppError::new(
        ErrorKind::NoImageProduced,
        "the model returned no inline image part",
    ))
}

fn first_candidate(payload: &Value) -> Option<&Value> {
    payload.get("candidates").and_then(Value::as_array)?.first()
}

fn success_payload(result: &HttpResult) -> Result<Value, AppError> {
    let response = result.as_ref().map_err(|e| {
        AppError::new(ErrorKind::Provider, e.to_string())
    })?;

    if !response.is_success() {
        return Err(status_error(response));
    }

    response.json::<Value>().map_err(provider_error)
}

fn status_error(response: &HttpResponse) -> AppError {
    let detail = serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| {
            body.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP status {}", response.status));

    AppError::new(ErrorKind::Provider, detail)
}

fn provider_error(e: impl std::fmt::Display) -> AppError {
    AppError::new(ErrorKind::Provider, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HttpError;
    use crate::grounding::Citation;

    fn key() -> ApiKey {
        ApiKey::new("test-key")
    }

    fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_slice(request.body.as_deref().unwrap()).unwrap()
    }

    fn ok_response(payload: Value) -> HttpResult {
        Ok(HttpResponse::new(200, serde_json::to_vec(&payload).unwrap()))
    }

    #[test]
    fn test_query_request_carries_location_hint() {
        let location = LatLon::new(35.6, 139.7).unwrap();
        let request =
            grounded_query_request(Some(&key()), "Best ramen nearby?", Some(location)).unwrap();

        assert!(request.url.contains(MAPS_MODEL));
        assert!(request.url.ends_with("key=test-key"));

        let body = body_json(&request);
        assert_eq!(
            body["contents"][0]["parts"][0]["text"],
            "Best ramen nearby?"
        );
        assert_eq!(body["tools"][0], json!({ "googleMaps": {} }));
        assert_eq!(
            body["toolConfig"]["retrievalConfig"]["latLng"]["latitude"],
            35.6
        );
        assert_eq!(
            body["toolConfig"]["retrievalConfig"]["latLng"]["longitude"],
            139.7
        );
    }

    #[test]
    fn test_query_request_omits_tool_config_without_location() {
        let request = grounded_query_request(Some(&key()), "coffee", None).unwrap();
        assert!(body_json(&request).get("toolConfig").is_none());
    }

    #[test]
    fn test_missing_key_is_auth_error() {
        let err = grounded_query_request(None, "coffee", None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_edit_request_inlines_image_and_instruction() {
        let image = UploadedImage::new(vec![0xFF, 0xD8, 0xFF, 0x00]).unwrap();
        let request = edit_image_request(Some(&key()), &image, "cyberpunk style").unwrap();

        assert!(request.url.contains(IMAGE_EDIT_MODEL));

        let body = body_json(&request);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(
            parts[0]["inlineData"]["data"],
            BASE64.encode([0xFFu8, 0xD8, 0xFF, 0x00])
        );
        assert_eq!(parts[1]["text"], "cyberpunk style");
    }

    #[test]
    fn test_parse_grounded_response_full() {
        let result = ok_response(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Try Ichiro." }] },
                "groundingMetadata": {
                    "groundingChunks": [
                        { "maps": { "uri": "https://maps.example", "title": "Ichiro" } },
                        { "bogus": true },
                    ]
                }
            }]
        }));

        let parsed = parse_grounded_response(&result).unwrap();
        assert_eq!(parsed.answer_text, "Try Ichiro.");
        assert_eq!(
            parsed.citations,
            vec![Citation::Place {
                uri: "https://maps.example".into(),
                title: "Ichiro".into(),
                review_snippets: vec![],
            }]
        );
    }

    #[test]
    fn test_parse_grounded_response_empty_text_falls_back() {
        let result = ok_response(json!({
            "candidates": [{ "content": { "parts": [] } }]
        }));

        let parsed = parse_grounded_response(&result).unwrap();
        assert_eq!(parsed.answer_text, NO_DETAILS_FALLBACK);
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn test_parse_grounded_response_no_candidates() {
        let parsed = parse_grounded_response(&ok_response(json!({}))).unwrap();
        assert_eq!(parsed.answer_text, NO_DETAILS_FALLBACK);
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn test_transport_failure_maps_to_provider_error() {
        let result: HttpResult = Err(HttpError::Network {
            message: "connection reset".into(),
        });
        let err = parse_grounded_response(&result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Provider);
    }

    #[test]
    fn test_remote_error_message_is_extracted() {
        let result: HttpResult = Ok(HttpResponse::new(
            429,
            serde_json::to_vec(&json!({ "error": { "message": "quota exceeded" } })).unwrap(),
        ));

        let err = parse_grounded_response(&result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Provider);
        assert_eq!(err.message, "quota exceeded");
    }

    #[test]
    fn test_malformed_body_is_provider_error() {
        let result: HttpResult = Ok(HttpResponse::new(200, b"<html>".to_vec()));
        let err = parse_grounded_response(&result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Provider);
    }

    #[test]
    fn test_first_inline_image_part_wins() {
        let result = ok_response(json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "here you go" },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode([1u8, 2]) } },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode([9u8]) } },
                    ]
                }
            }]
        }));

        assert_eq!(parse_edited_image(&result).unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_no_image_part_is_distinct_error() {
        let result = ok_response(json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        }));

        let err = parse_edited_image(&result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoImageProduced);
    }

    #[test]
    fn test_invalid_base64_is_provider_error() {
        let result = ok_response(json!({
            "candidates": [{
                "content": { "parts": [{ "inlineData": { "data": "!!not base64!!" } }] }
            }]
        }));

        let err = parse_edited_image(&result).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Provider);
    }
}
