//! Fatal error kinds for a benchmark run.
//!
//! Every variant aborts the run: the aggregate statistics are meaningless
//! once a single switch is missing or desynchronized, so there is no
//! partial-run salvage. Transient `WouldBlock`/`Interrupted` conditions are
//! retried at the I/O seams and never surface here.

use std::io;

/// A fatal benchmark failure.
#[derive(Debug)]
pub enum BenchError {
    /// A flag combination that cannot describe a runnable benchmark.
    Config(String),
    /// The controller hostname did not resolve to a usable address.
    Resolution(String),
    /// TCP connect failure, including the connect timeout.
    Connect(String),
    /// Socket read/write failure mid-run, including the controller closing
    /// a connection.
    Io(io::Error),
    /// Unrecoverable framing on a connection: bad header, impossible
    /// length, or a receive buffer that filled without a parseable message.
    ProtocolDesync(String),
}

impl std::fmt::Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Resolution(msg) => write!(f, "cannot resolve controller: {msg}"),
            Self::Connect(msg) => write!(f, "cannot connect to controller: {msg}"),
            Self::Io(err) => write!(f, "socket error: {err}"),
            Self::ProtocolDesync(msg) => write!(f, "protocol desync: {msg}"),
        }
    }
}

impl std::error::Error for BenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for BenchError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let e = BenchError::Config("warmup + cooldown must leave at least one loop".into());
        assert!(e.to_string().contains("warmup + cooldown"));

        let e = BenchError::ProtocolDesync("bad version 0x04".into());
        assert!(e.to_string().starts_with("protocol desync"));
    }

    #[test]
    fn io_error_converts_and_chains() {
        let inner = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let e = BenchError::from(inner);
        assert!(matches!(e, BenchError::Io(_)));
        assert!(std::error::Error::source(&e).is_some());
    }
}
