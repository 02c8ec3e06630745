//! Line framing for the ISP serial dialogue.
//!
//! Command lines are a verb token plus space-joined unsigned decimal
//! arguments. Every line in either direction ends with the two-byte
//! [`EOL`] marker; replies are parsed by trimming exactly one trailing
//! occurrence of it.

use crate::protocol::{Command, ReturnCode, EOL};

/// Build a command frame from a verb and its decimal arguments
pub fn frame(command: Command, args: &[u32]) -> Vec<u8> {
    let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let tokens: Vec<&str> = rendered.iter().map(|s| s.as_str()).collect();
    frame_tokens(command.verb(), &tokens)
}

/// Build a command frame from pre-rendered argument tokens.
///
/// Used for the `G` command, whose final argument is a mode letter
/// rather than a decimal integer.
pub fn frame_tokens(verb: &str, tokens: &[&str]) -> Vec<u8> {
    let mut out = Vec::with_capacity(verb.len() + tokens.len() * 8 + EOL.len());
    out.extend_from_slice(verb.as_bytes());
    for token in tokens {
        out.push(b' ');
        out.extend_from_slice(token.as_bytes());
    }
    out.extend_from_slice(EOL);
    out
}

/// Terminate a bare line body, as used by the handshake
pub fn line(body: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + EOL.len());
    out.extend_from_slice(body.as_bytes());
    out.extend_from_slice(EOL);
    out
}

/// Trim exactly one trailing end-of-line marker from a received line
pub fn strip_eol(raw: &[u8]) -> Option<&[u8]> {
    if raw.ends_with(EOL) {
        Some(&raw[..raw.len() - EOL.len()])
    } else {
        None
    }
}

/// Parse an EOL-terminated line as an unsigned decimal value
pub fn parse_decimal(raw: &[u8]) -> Option<u32> {
    let body = strip_eol(raw)?;
    let text = core::str::from_utf8(body).ok()?;
    text.parse().ok()
}

/// Parse an EOL-terminated line as a status value
pub fn parse_return_code(raw: &[u8]) -> Option<ReturnCode> {
    parse_decimal(raw).map(ReturnCode::from_code)
}

/// Lossy rendering of a wire line for error reporting
pub(crate) fn printable(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn frames_verb_with_decimal_args() {
        assert_eq!(frame(Command::Unlock, &[23130]), b"U 23130\r\n".to_vec());
        assert_eq!(
            frame(Command::WriteToRam, &[268_435_968, 1024]),
            b"W 268435968 1024\r\n".to_vec()
        );
    }

    #[test]
    fn frames_bare_verb() {
        assert_eq!(frame(Command::ReadPartId, &[]), b"J\r\n".to_vec());
    }

    #[test]
    fn frames_token_args() {
        assert_eq!(frame_tokens("G", &["4096", "T"]), b"G 4096 T\r\n".to_vec());
    }

    #[test]
    fn strips_exactly_one_marker() {
        assert_eq!(strip_eol(b"OK\r\n"), Some(&b"OK"[..]));
        assert_eq!(strip_eol(b"OK\r\n\r\n"), Some(&b"OK\r\n"[..]));
        assert_eq!(strip_eol(b"OK"), None);
        assert_eq!(strip_eol(b"OK\r"), None);
    }

    #[test]
    fn parses_return_codes() {
        assert_eq!(parse_return_code(b"0\r\n"), Some(ReturnCode::Success));
        assert_eq!(
            parse_return_code(b"11\r\n"),
            Some(ReturnCode::CodeReadProtectionEnabled)
        );
        assert_eq!(
            parse_return_code(b"19\r\n"),
            Some(ReturnCode::UnknownCode(19))
        );
    }

    #[test]
    fn rejects_non_numeric_reply() {
        assert_eq!(parse_return_code(b"OK\r\n"), None);
        assert_eq!(parse_return_code(b"0"), None);
    }
}
