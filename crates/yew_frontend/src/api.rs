//! Backend HTTP calls
//!
//! The non-streaming endpoints go through `gloo-net`. The streaming
//! endpoint drops down to the raw fetch API so chunks can be rendered
//! as they arrive instead of after the body completes.

use gloo_net::http::Request;
use js_sys::{Reflect, Uint8Array};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, FormData, ReadableStreamDefaultReader, RequestInit, Response};

/// Join a user-supplied base URL and an endpoint path
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pull the `detail` message out of an error body, falling back to the
/// raw text
fn detail_from_body(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .and_then(|detail| detail.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {status}: {body}"))
}

fn js_error(context: &str, value: JsValue) -> String {
    match value.as_string() {
        Some(detail) => format!("{context}: {detail}"),
        None => format!("{context}: {value:?}"),
    }
}

/// Multipart body with the field names the backend expects
fn build_form(file: Option<&File>, prompt: &str) -> Result<FormData, String> {
    let form = FormData::new().map_err(|e| js_error("failed to build form", e))?;
    if let Some(file) = file {
        form.append_with_blob_and_filename("files", file, &file.name())
            .map_err(|e| js_error("failed to attach file", e))?;
    }
    form.append_with_str("text_prompt", prompt)
        .map_err(|e| js_error("failed to attach prompt", e))?;
    Ok(form)
}

/// Probe the server's liveness endpoint
pub async fn check_health(base_url: &str) -> Result<String, String> {
    let response = Request::get(&endpoint_url(base_url, "health"))
        .send()
        .await
        .map_err(|e| format!("health request failed: {e}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if response.ok() {
        Ok(body)
    } else {
        Err(detail_from_body(status, &body))
    }
}

/// Submit an image and prompt, returning the whole generated text
pub async fn process_image(base_url: &str, file: &File, prompt: &str) -> Result<String, String> {
    let form = build_form(Some(file), prompt)?;
    let response = Request::post(&endpoint_url(base_url, "process_image/"))
        .body(form)
        .map_err(|e| format!("failed to build request: {e}"))?
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if response.ok() {
        Ok(body)
    } else {
        Err(detail_from_body(status, &body))
    }
}

/// Submit to the streaming endpoint, invoking `on_progress` with the
/// accumulated text after every received chunk
///
/// Resolves to the complete text once the stream ends. Pre-stream
/// failures surface as `Err`; a stream whose text begins `Error` is the
/// backend reporting a mid-generation failure and is left to the caller
/// to present.
pub async fn stream_process_image(
    base_url: &str,
    file: Option<&File>,
    prompt: &str,
    on_progress: impl Fn(&str),
) -> Result<String, String> {
    let form = build_form(file, prompt)?;

    let init = RequestInit::new();
    init.set_method("POST");
    init.set_body(&form);
    let request = web_sys::Request::new_with_str_and_init(
        &endpoint_url(base_url, "stream_process_image/"),
        &init,
    )
    .map_err(|e| js_error("failed to build request", e))?;

    let window = web_sys::window().ok_or("no window object")?;
    let response: Response = JsFuture::from(window.fetch_with_request(&request))
        .await
        .map_err(|e| js_error("request failed", e))?
        .dyn_into()
        .map_err(|e| js_error("unexpected fetch result", e))?;

    if !response.ok() {
        let body = match response.text() {
            Ok(promise) => JsFuture::from(promise)
                .await
                .ok()
                .and_then(|value| value.as_string())
                .unwrap_or_default(),
            Err(_) => String::new(),
        };
        return Err(detail_from_body(response.status(), &body));
    }

    let body = response.body().ok_or("response had no body")?;
    let reader: ReadableStreamDefaultReader = body
        .get_reader()
        .dyn_into()
        .map_err(|e| js_error("unreadable response body", e.into()))?;

    let mut text = String::new();
    loop {
        let step = JsFuture::from(reader.read())
            .await
            .map_err(|e| js_error("stream read failed", e))?;
        let done = Reflect::get(&step, &JsValue::from_str("done"))
            .map_err(|e| js_error("malformed stream result", e))?
            .as_bool()
            .unwrap_or(true);
        if done {
            break;
        }
        let value = Reflect::get(&step, &JsValue::from_str("value"))
            .map_err(|e| js_error("malformed stream result", e))?;
        let bytes = Uint8Array::new(&value).to_vec();
        text.push_str(&String::from_utf8_lossy(&bytes));
        on_progress(&text);
    }

    Ok(text)
}
