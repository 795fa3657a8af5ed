//
// Copyright 2023-2025 VertoRTC Authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Log hygiene helpers.
//!
//! SDP blobs carry addresses and ICE credentials, and login frames carry
//! passwords; neither belongs in a log file verbatim.

/// Summarizes an SDP blob for logging: keeps the first line and a length.
pub fn redact_sdp(sdp: &str) -> String {
    match sdp.lines().next() {
        Some(first) if !first.is_empty() => {
            format!("{}... ({} bytes)", first, sdp.len())
        }
        _ => format!("({} bytes)", sdp.len()),
    }
}

/// Replaces the values of sensitive JSON fields in an already-encoded
/// frame so the frame can be logged at debug level.
pub fn redact_frame(frame: &str) -> String {
    let mut redacted = frame.to_string();
    for key in ["\"passwd\":", "\"login_token\":", "\"sdp\":"] {
        redacted = redact_json_string_value(&redacted, key);
    }
    redacted
}

fn redact_json_string_value(frame: &str, key: &str) -> String {
    let mut out = String::with_capacity(frame.len());
    let mut rest = frame;
    while let Some(at) = rest.find(key) {
        let after_key = at + key.len();
        out.push_str(&rest[..after_key]);
        rest = &rest[after_key..];
        if let Some(open) = rest.find('"') {
            // Scan for the closing quote, honoring backslash escapes.
            let bytes = rest.as_bytes();
            let mut close = None;
            let mut i = open + 1;
            while i < bytes.len() {
                match bytes[i] {
                    b'\\' => i += 2,
                    b'"' => {
                        close = Some(i);
                        break;
                    }
                    _ => i += 1,
                }
            }
            if let Some(close) = close {
                out.push_str(&rest[..open]);
                out.push_str("\"<redacted>\"");
                rest = &rest[close + 1..];
                continue;
            }
        }
        break;
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_sdp_keeps_first_line() {
        let sdp = "v=0\r\no=- 46117317 2 IN IP4 127.0.0.1\r\n";
        let redacted = redact_sdp(sdp);
        assert!(redacted.starts_with("v=0"));
        assert!(!redacted.contains("127.0.0.1"));
    }

    #[test]
    fn redact_frame_hides_password() {
        let frame = r#"{"method":"login","params":{"login":"alice","passwd":"hunter2"}}"#;
        let redacted = redact_frame(frame);
        assert!(!redacted.contains("hunter2"));
        assert!(redacted.contains("alice"));
    }

    #[test]
    fn redact_frame_handles_escaped_quotes() {
        let frame = r#"{"sdp":"a=msid:\"x\" y","other":1}"#;
        let redacted = redact_frame(frame);
        assert!(!redacted.contains("msid"));
        assert!(redacted.contains("\"other\":1"));
    }
}
