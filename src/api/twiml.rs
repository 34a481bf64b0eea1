//! TwiML documents and the URLs that point Twilio at them

/// Path of the media stream WebSocket route
pub const MEDIA_STREAM_PATH: &str = "/outbound-media-stream";

/// Path of the TwiML route
pub const TWIML_PATH: &str = "/outbound-call-twiml";

/// `<Connect><Stream>` document that points the call's media at this server.
///
/// Prompt and first message ride along as stream parameters and come back
/// in the `start` event's custom parameters.
pub fn connect_stream(host: &str, prompt: &str, first_message: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            "<Response><Connect>",
            r#"<Stream url="wss://{host}{path}">"#,
            r#"<Parameter name="prompt" value="{prompt}"/>"#,
            r#"<Parameter name="first_message" value="{first_message}"/>"#,
            "</Stream></Connect></Response>"
        ),
        host = escape_xml(host),
        path = MEDIA_STREAM_PATH,
        prompt = escape_xml(prompt),
        first_message = escape_xml(first_message),
    )
}

/// Callback URL handed to Twilio when placing a call
pub fn callback_url(host: &str, prompt: &str, first_message: &str) -> Result<reqwest::Url, String> {
    reqwest::Url::parse_with_params(
        &format!("https://{host}{TWIML_PATH}"),
        &[("prompt", prompt), ("first_message", first_message)],
    )
    .map_err(|e| format!("invalid callback host {host:?}: {e}"))
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
