//! Test vector file format.
//!
//! ```text
//! # comment
//! maglev_hash_table_size_index: 5
//! maglev_id: 49394
//! num_buckets: 4
//! bucket_weight: 1
//! 172.20.88.194:52794 172.20.234.26:80 6 0x5271e49c 3
//! ```
//!
//! Tokens are separated by spaces or colons. Header keys are only recognised
//! before the first flow line; once a line starts with a digit every
//! following line is a flow.

use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;

use maglev_hash::IPPROTO_TCP;
use tracing::info;

use crate::error::{Result, TestVecError};

/// One recorded flow and the bucket it was sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TvEntry {
    /// Source address.
    pub src: Ipv4Addr,
    /// Source port.
    pub sport: u16,
    /// Destination address.
    pub dst: Ipv4Addr,
    /// Destination port.
    pub dport: u16,
    /// IP protocol number.
    pub protocol: u8,
    /// Recorded flow hash.
    pub hash: u32,
    /// Recorded bucket.
    pub bucket_id: u32,
}

/// A parsed test vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestVector {
    /// Table size class of the group.
    pub table_size_index: u32,
    /// Group identifier.
    pub maglev_id: u32,
    /// Buckets `1..=num_buckets` make up the group.
    pub num_buckets: u32,
    /// Weight of every bucket.
    pub bucket_weight: u16,
    /// Name of the secondary hash the recording used, if any.
    pub hash2: Option<String>,
    /// Recorded flows, in file order.
    pub entries: Vec<TvEntry>,
}

impl Default for TestVector {
    fn default() -> Self {
        Self {
            table_size_index: 0,
            maglev_id: 0,
            num_buckets: 0,
            bucket_weight: 1,
            hash2: None,
            entries: Vec::new(),
        }
    }
}

impl TestVector {
    /// Load a test vector from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading test vector");
        let text = std::fs::read_to_string(path).map_err(|source| TestVecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        text.parse()
    }
}

impl FromStr for TestVector {
    type Err = TestVecError;

    fn from_str(text: &str) -> Result<Self> {
        let mut tv = TestVector::default();
        let mut in_flows = false;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let tokens: Vec<&str> = trimmed
                .split(|c: char| c == ':' || c.is_ascii_whitespace())
                .filter(|t| !t.is_empty())
                .collect();
            if tokens.is_empty() {
                continue;
            }

            if !in_flows {
                let value = tokens.get(1).copied();
                match tokens[0] {
                    "maglev_hash_table_size_index" => {
                        tv.table_size_index = number(value, line, "table size index")?;
                        continue;
                    }
                    "maglev_id" => {
                        tv.maglev_id = number(value, line, "maglev id")?;
                        continue;
                    }
                    "num_buckets" => {
                        tv.num_buckets = number(value, line, "bucket count")?;
                        continue;
                    }
                    "bucket_weight" => {
                        tv.bucket_weight = number(value, line, "bucket weight")?;
                        continue;
                    }
                    "maglev_hash2" => {
                        tv.hash2 = value.map(str::to_owned);
                        continue;
                    }
                    key if !key.starts_with(|c: char| c.is_ascii_digit()) => {
                        info!(line, data = trimmed, "Unknown test vector data");
                        continue;
                    }
                    _ => in_flows = true,
                }
            }

            tv.entries.push(entry(&tokens, line)?);
        }

        info!(
            maglev_id = tv.maglev_id,
            entries = tv.entries.len(),
            "Test vector loaded"
        );
        Ok(tv)
    }
}

fn entry(tokens: &[&str], line: usize) -> Result<TvEntry> {
    // The protocol column may be left out, in which case the flow is TCP.
    let (protocol, rest) = match tokens.len() {
        7 => (number(Some(tokens[4]), line, "protocol")?, &tokens[5..]),
        6 => (IPPROTO_TCP, &tokens[4..]),
        n => {
            return Err(TestVecError::Parse {
                line,
                reason: format!("expected 6 or 7 fields, found {n}"),
            })
        }
    };

    Ok(TvEntry {
        src: address(tokens[0], line)?,
        sport: number(Some(tokens[1]), line, "source port")?,
        dst: address(tokens[2], line)?,
        dport: number(Some(tokens[3]), line, "destination port")?,
        protocol,
        hash: hex(rest[0], line)?,
        bucket_id: number(Some(rest[1]), line, "bucket id")?,
    })
}

fn number<N: FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<N> {
    let token = token.ok_or_else(|| TestVecError::Parse {
        line,
        reason: format!("missing {what}"),
    })?;
    token.parse().map_err(|_| TestVecError::Parse {
        line,
        reason: format!("invalid {what} {token:?}"),
    })
}

fn address(token: &str, line: usize) -> Result<Ipv4Addr> {
    token.parse().map_err(|_| TestVecError::Parse {
        line,
        reason: format!("invalid IPv4 address {token:?}"),
    })
}

fn hex(token: &str, line: usize) -> Result<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(digits, 16).map_err(|_| TestVecError::Parse {
        line,
        reason: format!("invalid hash {token:?}"),
    })
}
