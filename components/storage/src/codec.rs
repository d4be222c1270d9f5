// Copyright 2024 glacier-list
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Encodes the records of one chunk into a single blob and back.
//!
//! ## Layout
//!
//! ```text
//! +-------+---------+----------+-------+-------------+-------+---------------+
//! | magic | version | reserved | count | payload len | crc32 | payload ...   |
//! |  4B   |   1B    |    3B    | u32LE |    u32LE    | u32LE | bincode       |
//! +-------+---------+----------+-------+-------------+-------+---------------+
//! ```
//!
//! The record count sits in the header so a chunk can be sized without
//! decoding its payload, see [peek_len].

use byteorder::{ByteOrder, LittleEndian};
use glacier_types::{Record, Value};
use snafu::{ensure, Location, ResultExt, Snafu};

pub const MAGIC: [u8; 4] = *b"GLCK";
pub const VERSION: u8 = 1;
pub const HEADER_LEN: usize = 20;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("unsupported value at {}: {}", path, reason))]
    Unsupported {
        path:     String,
        reason:   String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("chunk too large: {} {}", what, len))]
    Oversized {
        what:     &'static str,
        len:      usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("truncated chunk: expect {} bytes, got {}", expected, actual))]
    Truncated {
        expected: usize,
        actual:   usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("bad magic {:?}", found))]
    BadMagic {
        found:    [u8; 4],
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("unknown chunk format version {}", version))]
    UnknownVersion {
        version:  u8,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("checksum mismatch: header {:#010x}, payload {:#010x}", expected, actual))]
    ChecksumMismatch {
        expected: u32,
        actual:   u32,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("record count mismatch: header {}, payload {}", expected, actual))]
    CountMismatch {
        expected: usize,
        actual:   usize,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("malformed payload: {}", source))]
    Payload {
        source:   bincode::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn encode(records: &[Record]) -> Result<Vec<u8>> {
    for (idx, record) in records.iter().enumerate() {
        let mut path = vec![Segment::Index(idx)];
        check_record(record, &mut path)?;
    }
    let count = u32::try_from(records.len()).map_err(|_| {
        OversizedSnafu {
            what: "record count",
            len:  records.len(),
        }
        .build()
    })?;
    let payload = bincode::serialize(records).context(PayloadSnafu)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| {
        OversizedSnafu {
            what: "payload length",
            len:  payload.len(),
        }
        .build()
    })?;

    let mut buf = vec![0u8; HEADER_LEN + payload.len()];
    buf[0..4].copy_from_slice(&MAGIC);
    buf[4] = VERSION;
    LittleEndian::write_u32(&mut buf[8..12], count);
    LittleEndian::write_u32(&mut buf[12..16], payload_len);
    LittleEndian::write_u32(&mut buf[16..20], crc32fast::hash(&payload));
    buf[HEADER_LEN..].copy_from_slice(&payload);
    Ok(buf)
}

pub fn decode(buf: &[u8]) -> Result<Vec<Record>> {
    let header = Header::parse(buf)?;
    let expected = HEADER_LEN + header.payload_len;
    ensure!(
        buf.len() == expected,
        TruncatedSnafu {
            expected,
            actual: buf.len()
        }
    );
    let payload = &buf[HEADER_LEN..];
    let actual = crc32fast::hash(payload);
    ensure!(
        actual == header.checksum,
        ChecksumMismatchSnafu {
            expected: header.checksum,
            actual,
        }
    );
    let records: Vec<Record> = bincode::deserialize(payload).context(PayloadSnafu)?;
    ensure!(
        records.len() == header.count,
        CountMismatchSnafu {
            expected: header.count,
            actual:   records.len(),
        }
    );
    Ok(records)
}

/// The number of records in an encoded chunk, read from the header alone.
pub fn peek_len(buf: &[u8]) -> Result<usize> { Header::parse(buf).map(|h| h.count) }

struct Header {
    count:       usize,
    payload_len: usize,
    checksum:    u32,
}

impl Header {
    fn parse(buf: &[u8]) -> Result<Header> {
        ensure!(
            buf.len() >= HEADER_LEN,
            TruncatedSnafu {
                expected: HEADER_LEN,
                actual:   buf.len(),
            }
        );
        let mut found = [0u8; 4];
        found.copy_from_slice(&buf[0..4]);
        ensure!(found == MAGIC, BadMagicSnafu { found });
        ensure!(buf[4] == VERSION, UnknownVersionSnafu { version: buf[4] });
        Ok(Header {
            count:       LittleEndian::read_u32(&buf[8..12]) as usize,
            payload_len: LittleEndian::read_u32(&buf[12..16]) as usize,
            checksum:    LittleEndian::read_u32(&buf[16..20]),
        })
    }
}

enum Segment<'a> {
    Index(usize),
    Field(&'a str),
}

// [3].metadata.scores[2]
fn render_path(path: &[Segment<'_>]) -> String {
    let mut out = String::new();
    for seg in path {
        match seg {
            Segment::Index(i) => out.push_str(&format!("[{}]", i)),
            Segment::Field(name) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(name);
            }
        }
    }
    out
}

fn check_record<'a>(record: &'a Record, path: &mut Vec<Segment<'a>>) -> Result<()> {
    for (name, value) in record.iter() {
        path.push(Segment::Field(name));
        check_value(value, path)?;
        path.pop();
    }
    Ok(())
}

fn check_value<'a>(value: &'a Value, path: &mut Vec<Segment<'a>>) -> Result<()> {
    match value {
        Value::Float(f) if !f.is_finite() => UnsupportedSnafu {
            path:   render_path(path),
            reason: format!("non-finite float {}", f),
        }
        .fail(),
        Value::List(items) => {
            for (i, item) in items.iter().enumerate() {
                path.push(Segment::Index(i));
                check_value(item, path)?;
                path.pop();
            }
            Ok(())
        }
        Value::Map(record) => check_record(record, path),
        _ => Ok(()),
    }
}
