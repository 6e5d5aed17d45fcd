//! Line protocol spoken between the TCP cache client and the cache process.
//!
//! Requests are single lines, `GET <key>\n` or `SET <key> <value>\n`, UTF-8
//! encoded with no escaping. Responses are single newline-terminated lines:
//! the value for a GET hit, [`MISS_MARKER`] for a miss, [`ACK`] for a SET
//! and `ERR <message>` for any failure.
//!
//! The markers share the line with values, so a value that reads as a marker
//! (`NOT_FOUND`, `ERR`, or anything starting with `ERR `) cannot be stored and
//! is rejected before sending, like values containing a line break.

use crate::error::{AppError, Result};

/// Response line for a GET on an absent or expired key
pub const MISS_MARKER: &str = "NOT_FOUND";

/// Response line acknowledging a SET
pub const ACK: &str = "OK";

/// Prefix of an error response line
pub const ERR_PREFIX: &str = "ERR";

/// Frame terminator
pub const TERMINATOR: u8 = b'\n';

/// A client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    Get { key: &'a str },
    Set { key: &'a str, value: &'a str },
}

impl<'a> Request<'a> {
    /// Build a validated GET request
    pub fn get(key: &'a str) -> Result<Self> {
        validate_key(key)?;
        Ok(Request::Get { key })
    }

    /// Build a validated SET request
    pub fn set(key: &'a str, value: &'a str) -> Result<Self> {
        validate_key(key)?;
        validate_value(value)?;
        Ok(Request::Set { key, value })
    }

    /// Encode to wire bytes including the terminator
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Request::Get { key } => {
                let mut buf = Vec::with_capacity(5 + key.len());
                buf.extend_from_slice(b"GET ");
                buf.extend_from_slice(key.as_bytes());
                buf.push(TERMINATOR);
                buf
            }
            Request::Set { key, value } => {
                let mut buf = Vec::with_capacity(6 + key.len() + value.len());
                buf.extend_from_slice(b"SET ");
                buf.extend_from_slice(key.as_bytes());
                buf.push(b' ');
                buf.extend_from_slice(value.as_bytes());
                buf.push(TERMINATOR);
                buf
            }
        }
    }
}

/// Keys are whitespace-delimited on the wire
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(AppError::validation("Cache key cannot be empty"));
    }
    if key.chars().any(char::is_whitespace) {
        return Err(AppError::validation(format!(
            "Cache key '{}' contains whitespace",
            key.escape_debug()
        )));
    }
    Ok(())
}

/// Values may contain spaces but a newline would end the frame early
pub fn validate_value(value: &str) -> Result<()> {
    if value.contains('\n') || value.contains('\r') {
        return Err(AppError::validation(
            "Cache value contains a line break, which the line protocol cannot frame",
        ));
    }
    // Replies are trimmed before interpretation
    let reply = value.trim();
    if reply == MISS_MARKER || remote_error(reply).is_some() {
        return Err(AppError::validation(format!(
            "Cache value '{}' would be read back as a {} reply",
            value.escape_debug(),
            if reply == MISS_MARKER { "miss" } else { "error" }
        )));
    }
    Ok(())
}

/// Interpreted response to a GET
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetReply {
    Hit(String),
    Miss,
}

/// Decode a raw response line (terminator included or not) into its trimmed text
pub fn decode_line(raw: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(raw)
        .map_err(|e| AppError::protocol(format!("Response is not valid UTF-8: {}", e)))?;
    Ok(text.trim())
}

fn remote_error(line: &str) -> Option<AppError> {
    if line == ERR_PREFIX {
        return Some(AppError::remote("cache returned an error"));
    }
    line.strip_prefix("ERR ")
        .map(|message| AppError::remote(message.trim().to_string()))
}

/// Interpret a trimmed GET response line
pub fn parse_get_reply(line: &str) -> Result<GetReply> {
    if let Some(error) = remote_error(line) {
        return Err(error);
    }
    if line == MISS_MARKER {
        Ok(GetReply::Miss)
    } else {
        Ok(GetReply::Hit(line.to_string()))
    }
}

/// Interpret a trimmed SET response line
pub fn parse_set_reply(line: &str) -> Result<()> {
    match remote_error(line) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// A command as seen by the server side
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get { key: String },
    Set { key: String, value: String },
}

/// Parse one request line (without terminator) on the server side
pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (verb, rest) = match line.split_once(' ') {
        Some((verb, rest)) => (verb, rest),
        None => (line, ""),
    };

    if verb.eq_ignore_ascii_case("GET") {
        let key = rest.trim();
        validate_key(key)?;
        Ok(Command::Get { key: key.to_string() })
    } else if verb.eq_ignore_ascii_case("SET") {
        let (key, value) = rest
            .split_once(' ')
            .ok_or_else(|| AppError::validation("SET requires a key and a value"))?;
        validate_key(key)?;
        Ok(Command::Set {
            key: key.to_string(),
            value: value.to_string(),
        })
    } else {
        Err(AppError::validation(format!("Unknown command '{}'", verb)))
    }
}

/// Encode a server response line
pub fn encode_response(line: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(TERMINATOR);
    buf
}
