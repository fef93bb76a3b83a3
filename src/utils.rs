//! Utility functions shared by the library and the executables.
//!

use anyhow::Result;
use bytes::Bytes;

/// Read an entire [`Bytes`] slice into a [`String`].
///
/// Returns an error if the slice contains invalid UTF-8.
pub fn string_from_bytes(buf: Bytes) -> Result<String> {
    Ok(String::from_utf8(buf.as_ref().into())?)
}

/// Sets up `env_logger` on stderr, at `info` unless `RUST_LOG` says
/// otherwise. Stdout is left to the data.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_only() {
        assert_eq!(string_from_bytes(Bytes::from("Drama")).unwrap(), "Drama");
        assert!(string_from_bytes(Bytes::from_static(b"\xc3\x28")).is_err());
    }
}
