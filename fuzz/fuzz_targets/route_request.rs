//! Drives the reference backend with arbitrary requests.
//!
//! Input layout: first byte selects the method, the next line is the URL
//! (prefixed with the backend host), and the remainder is a JSON body.
//! The backend must answer every request without panicking, and reads must
//! never append comments.

#![no_main]
use bugbridge_core::rest::{Method, Request, Transport};
use bugbridge_sim::fixtures;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((selector, rest)) = data.split_first() else {
        return;
    };
    let Ok(text) = std::str::from_utf8(rest) else {
        return;
    };
    let (path, body) = text.split_once('\n').unwrap_or((text, ""));
    let method = match selector % 3 {
        0 => Method::Get,
        1 => Method::Put,
        _ => Method::Post,
    };
    let request = Request {
        method,
        url: format!("https://{}/{path}", fixtures::HOST),
        json: serde_json::from_str(body).ok(),
    };

    let Ok(backend) = fixtures::backend_with_radar() else {
        return;
    };
    let before = backend.comment_count();
    let response = backend.send(&request);
    assert!((200..600).contains(&response.status));
    if method == Method::Get {
        assert_eq!(backend.comment_count(), before, "GET must not append comments");
    }
});
