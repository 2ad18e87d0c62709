//! Line-oriented block protocol spoken by the acquisition board.
//!
//! A block is a run of `name=[v1, v2, ...]` lines separated by `\r\n` and
//! terminated by an empty line (`\r\n\r\n`). Parsing is all or nothing: one bad
//! line drops the whole block so the store never receives misaligned columns.
use std::collections::BTreeMap;

use log::{debug, warn};

use crate::drivers::store::{Column, SeriesStore};
use crate::drivers::{FrameError, OxyError};

pub const BLOCK_DELIMITER: &[u8] = b"\r\n\r\n";
const LINE_SEPARATOR: &[u8] = b"\r\n";
const NAME_SEPARATOR: u8 = b'=';
const VALUE_SEPARATOR: u8 = b',';
const VALUE_DELIMITERS: &[u8] = b"[]\r\n ";

/// Named columns decoded from one block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBlock {
    columns: BTreeMap<Column, Vec<f64>>,
}
impl SampleBlock {
    pub fn insert(&mut self, column: Column, values: Vec<f64>) -> Result<(), FrameError> {
        if self.columns.contains_key(&column) {
            return Err(FrameError::DuplicateColumn(column.name().to_string()));
        }
        self.columns.insert(column, values);
        Ok(())
    }
    pub fn get(&self, column: Column) -> Option<&[f64]> {
        self.columns.get(&column).map(|v| v.as_slice())
    }
    pub fn columns(&self) -> impl Iterator<Item = (Column, &[f64])> {
        self.columns.iter().map(|(c, v)| (*c, v.as_slice()))
    }
    /// Length of the longest column.
    pub fn rows(&self) -> usize {
        self.columns.values().map(|v| v.len()).max().unwrap_or(0)
    }
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }
    /// Front-pads shorter columns with `NaN` so every column ends on the same row.
    pub fn reconcile(&mut self) {
        let rows = self.rows();
        for values in self.columns.values_mut() {
            let pad = rows - values.len();
            if pad > 0 {
                values.splice(0..0, std::iter::repeat(f64::NAN).take(pad));
            }
        }
    }
}
/// What one decode call did to the store.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodeOutcome {
    Appended(usize),
    NoData,
    Discarded(FrameError),
}
/// Parses one raw block. An empty buffer (read timeout) yields an empty block.
///
/// Malformed content is reported as [`OxyError::Frame`]; a column name that is
/// not UTF-8 is reported as [`OxyError::NameEncoding`].
pub fn parse_block(raw: &[u8]) -> Result<SampleBlock, OxyError> {
    let mut block = SampleBlock::default();
    let body = trim(raw, |b| b.is_ascii_whitespace());
    if body.is_empty() {
        return Ok(block);
    }
    for (line_no, line) in split_on(body, LINE_SEPARATOR).enumerate() {
        let Some(eq) = line.iter().position(|&b| b == NAME_SEPARATOR) else {
            return Err(FrameError::MissingSeparator { line: line_no + 1 }.into());
        };
        let name = std::str::from_utf8(trim(&line[..eq], |b| b.is_ascii_whitespace()))?;
        let column =
            Column::from_wire(name).ok_or_else(|| FrameError::UnknownColumn(name.to_string()))?;
        let values = parse_values(name, &line[eq + 1..])?;
        block.insert(column, values)?;
    }
    block.reconcile();
    Ok(block)
}
fn parse_values(name: &str, raw: &[u8]) -> Result<Vec<f64>, FrameError> {
    let list = trim(raw, |b| VALUE_DELIMITERS.contains(&b));
    list.split(|&b| b == VALUE_SEPARATOR)
        .map(|token| {
            let token = trim(token, |b| b.is_ascii_whitespace());
            std::str::from_utf8(token)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or_else(|| FrameError::InvalidNumber {
                    name: name.to_string(),
                    token: String::from_utf8_lossy(token).into_owned(),
                })
        })
        .collect()
}
/// Decodes `raw` and appends the result to `store`.
///
/// Malformed blocks are logged and discarded; only a broken column name
/// escapes as an error.
pub fn decode_into(raw: &[u8], store: &mut SeriesStore) -> Result<DecodeOutcome, OxyError> {
    if raw.is_empty() {
        return Ok(DecodeOutcome::NoData);
    }
    match parse_block(raw) {
        Ok(block) if block.is_empty() => {
            debug!("received an empty block ({} bytes)", raw.len());
            Ok(DecodeOutcome::NoData)
        }
        Ok(block) => Ok(DecodeOutcome::Appended(store.append_block(&block))),
        Err(OxyError::Frame(reason)) => {
            warn!("discarding block of {} bytes: {reason}", raw.len());
            Ok(DecodeOutcome::Discarded(reason))
        }
        Err(e) => Err(e),
    }
}
/// Serializes a block in the device's wire syntax.
pub fn encode_block(block: &SampleBlock) -> Vec<u8> {
    let lines: Vec<String> = block
        .columns()
        .map(|(column, values)| {
            let list: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            format!("{}=[{}]", column.name(), list.join(", "))
        })
        .collect();
    let mut out = lines.join("\r\n").into_bytes();
    out.extend_from_slice(BLOCK_DELIMITER);
    out
}
fn trim(bytes: &[u8], strip: impl Fn(u8) -> bool) -> &[u8] {
    let start = bytes.iter().position(|&b| !strip(b)).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|&b| !strip(b)).map_or(start, |i| i + 1);
    &bytes[start..end]
}
fn split_on<'a>(bytes: &'a [u8], separator: &'a [u8]) -> impl Iterator<Item = &'a [u8]> + 'a {
    let mut rest = Some(bytes);
    std::iter::from_fn(move || {
        let current = rest?;
        match find(current, separator) {
            Some(at) => {
                rest = Some(&current[at + separator.len()..]);
                Some(&current[..at])
            }
            None => {
                rest = None;
                Some(current)
            }
        }
    })
}
/// Position of the first occurrence of `needle` in `haystack`.
pub fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
