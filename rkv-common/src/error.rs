use std::fmt;

/// Wire-level error codes carried in an `ERR` reply (see the protocol codec).
///
/// These are the only errors a client ever observes; everything else is
/// either a protocol violation (connection closed, no reply sent) or a
/// process-fatal condition (server exits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ErrCode {
    Unknown = 1,
    TooBig = 2,
    Type = 3,
    Arg = 4,
}

impl ErrCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrCode::Unknown => "UNKNOWN",
            ErrCode::TooBig => "TOO_BIG",
            ErrCode::Type => "TYPE",
            ErrCode::Arg => "ARG",
        };
        write!(f, "{name}")
    }
}

/// Errors that can abort a connection or the process outright.
///
/// Command-level failures (unknown command, type mismatch, bad argument)
/// never appear here: those are represented in-band as an `ERR` reply and
/// handled entirely inside the dispatcher. `Error` is reserved for things
/// that end the connection (`Protocol`) or the process (`Io` at startup).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn err_code_display_names_are_distinguishable() {
        assert_eq!(ErrCode::Unknown.to_string(), "UNKNOWN");
        assert_eq!(ErrCode::TooBig.to_string(), "TOO_BIG");
        assert_eq!(ErrCode::Type.to_string(), "TYPE");
        assert_eq!(ErrCode::Arg.to_string(), "ARG");
    }

    #[test]
    fn err_code_numeric_values_match_the_wire_protocol() {
        assert_eq!(ErrCode::Unknown.code(), 1);
        assert_eq!(ErrCode::TooBig.code(), 2);
        assert_eq!(ErrCode::Type.code(), 3);
        assert_eq!(ErrCode::Arg.code(), 4);
    }

    #[test]
    fn error_variants_render_distinguishable_messages() {
        let protocol = Error::Protocol("frame exceeds MAX_MSG");
        assert_eq!(protocol.to_string(), "protocol violation: frame exceeds MAX_MSG");

        let io: Error = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use").into();
        assert!(io.to_string().starts_with("io error:"));
    }
}
