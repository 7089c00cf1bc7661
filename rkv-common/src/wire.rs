//! # Wire Protocol
//!
//! Little-endian, length-prefixed framing for both directions.
//!
//! ## Request frame
//!
//! ```text
//! u32 total_len
//! u32 nstr
//! repeated nstr times:
//!   u32 len
//!   bytes[len]
//! ```
//!
//! ## Response frame
//!
//! ```text
//! u32 total_len
//! u8  tag        ; NIL=0 ERR=1 STR=2 INT=3 DBL=4 ARR=5
//! ... tag-specific body ...
//! ```
//!
//! `total_len` in both directions excludes itself. This module only deals
//! with the bytes after the `total_len` prefix has already been located by
//! the connection's read/write buffering (see the server crate); it never
//! touches a socket.

use crate::error::{Error, ErrCode};
use crate::limits::{MAX_ARGS, MAX_MSG};

pub const TAG_NIL: u8 = 0;
pub const TAG_ERR: u8 = 1;
pub const TAG_STR: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_DBL: u8 = 4;
pub const TAG_ARR: u8 = 5;

/// Parses one request body (the bytes following `total_len`, exactly
/// `body.len()` long) into its argument strings.
///
/// Mirrors `parse_req` from the tutorial source: reads `nstr`, then
/// `nstr` `(len, bytes)` pairs, and requires the cursor to land exactly on
/// `body.len()` at the end — any leftover or missing bytes is a protocol
/// violation, not a partial parse.
pub fn parse_request(body: &[u8]) -> Result<Vec<Vec<u8>>, Error> {
    if body.len() < 4 {
        return Err(Error::Protocol("request too short for nstr"));
    }
    let nstr = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
    if nstr > MAX_ARGS {
        return Err(Error::Protocol("too many arguments"));
    }

    let mut pos = 4usize;
    let mut args = Vec::with_capacity(nstr);
    for _ in 0..nstr {
        if pos + 4 > body.len() {
            return Err(Error::Protocol("truncated argument length"));
        }
        let len = u32::from_le_bytes(body[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + len > body.len() {
            return Err(Error::Protocol("truncated argument body"));
        }
        args.push(body[pos..pos + len].to_vec());
        pos += len;
    }

    if pos != body.len() {
        return Err(Error::Protocol("trailing bytes after last argument"));
    }
    Ok(args)
}

/// Begins a response frame: reserves the `total_len` placeholder and
/// returns its offset for [`response_end`] to patch later.
pub fn response_begin(buf: &mut Vec<u8>) -> usize {
    let pos = buf.len();
    buf.extend_from_slice(&[0u8; 4]);
    pos
}

/// Patches the `total_len` placeholder at `pos` with the number of bytes
/// written since. If that exceeds [`MAX_MSG`] the entire frame body
/// written since `pos` is discarded and replaced with a single `TOO_BIG`
/// error, matching the state machine's "responses longer than the
/// maximum are replaced" rule in the connection spec.
pub fn response_end(buf: &mut Vec<u8>, pos: usize) {
    let len = buf.len() - pos - 4;
    if len > MAX_MSG {
        buf.truncate(pos + 4);
        out_err(buf, ErrCode::TooBig, "response too big");
        let len = buf.len() - pos - 4;
        buf[pos..pos + 4].copy_from_slice(&(len as u32).to_le_bytes());
        return;
    }
    buf[pos..pos + 4].copy_from_slice(&(len as u32).to_le_bytes());
}

pub fn out_nil(buf: &mut Vec<u8>) {
    buf.push(TAG_NIL);
}

pub fn out_err(buf: &mut Vec<u8>, code: ErrCode, msg: &str) {
    buf.push(TAG_ERR);
    buf.extend_from_slice(&code.code().to_le_bytes());
    buf.extend_from_slice(&(msg.len() as u32).to_le_bytes());
    buf.extend_from_slice(msg.as_bytes());
}

pub fn out_str(buf: &mut Vec<u8>, data: &[u8]) {
    buf.push(TAG_STR);
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

pub fn out_int(buf: &mut Vec<u8>, val: i64) {
    buf.push(TAG_INT);
    buf.extend_from_slice(&val.to_le_bytes());
}

pub fn out_dbl(buf: &mut Vec<u8>, val: f64) {
    buf.push(TAG_DBL);
    buf.extend_from_slice(&val.to_ne_bytes());
}

/// Writes the `ARR` tag and a placeholder element count, returning the
/// offset of that count so [`end_arr`] can patch it once every element
/// has been written. This lets a handler (e.g. `zquery`) emit elements as
/// it discovers them instead of collecting them into an intermediate
/// buffer first.
pub fn begin_arr(buf: &mut Vec<u8>) -> usize {
    buf.push(TAG_ARR);
    let pos = buf.len();
    buf.extend_from_slice(&[0u8; 4]);
    pos
}

pub fn end_arr(buf: &mut Vec<u8>, pos: usize, nelem: u32) {
    buf[pos..pos + 4].copy_from_slice(&nelem.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_request(args: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(args.len() as u32).to_le_bytes());
        for a in args {
            body.extend_from_slice(&(a.len() as u32).to_le_bytes());
            body.extend_from_slice(a);
        }
        body
    }

    #[test]
    fn round_trips_simple_request() {
        let body = encode_request(&[b"set", b"foo", b"bar"]);
        let args = parse_request(&body).unwrap();
        assert_eq!(args, vec![b"set".to_vec(), b"foo".to_vec(), b"bar".to_vec()]);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut body = encode_request(&[b"get", b"foo"]);
        body.push(0xFF);
        assert!(parse_request(&body).is_err());
    }

    #[test]
    fn rejects_too_many_args() {
        let mut body = Vec::new();
        body.extend_from_slice(&((MAX_ARGS + 1) as u32).to_le_bytes());
        assert!(parse_request(&body).is_err());
    }

    #[test]
    fn nested_array_patches_correct_count() {
        let mut buf = Vec::new();
        let resp_pos = response_begin(&mut buf);
        let arr_pos = begin_arr(&mut buf);
        out_str(&mut buf, b"alice");
        out_dbl(&mut buf, 1.5);
        end_arr(&mut buf, arr_pos, 2);
        response_end(&mut buf, resp_pos);

        let total_len = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        assert_eq!(total_len as usize, buf.len() - 4);
        assert_eq!(buf[4], TAG_ARR);
        let nelem = u32::from_le_bytes(buf[5..9].try_into().unwrap());
        assert_eq!(nelem, 2);
    }

    #[test]
    fn oversize_response_becomes_too_big_error() {
        let mut buf = Vec::new();
        let resp_pos = response_begin(&mut buf);
        out_str(&mut buf, &vec![0u8; MAX_MSG + 1]);
        response_end(&mut buf, resp_pos);
        assert_eq!(buf[4], TAG_ERR);
    }
}
