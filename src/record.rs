//! Record schema shared by the carver, the sinks and the reducer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Url,
    Steamid,
    Chat,
    String,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Url => "url",
            RecordKind::Steamid => "steamid",
            RecordKind::Chat => "chat",
            RecordKind::String => "string",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(RecordKind::Url),
            "steamid" => Ok(RecordKind::Steamid),
            "chat" => Ok(RecordKind::Chat),
            "string" => Ok(RecordKind::String),
            other => Err(format!("unknown record kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Ascii,
    Utf16le,
}

impl Encoding {
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Ascii => "ascii",
            Encoding::Utf16le => "utf16le",
        }
    }
}

/// One classified artifact. `message` is only set for chat rows and `value`
/// only for url rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub kind: RecordKind,
    pub offset: u64,
    pub preview: String,
    pub steamid: Option<u64>,
    pub unix_ts: Option<u64>,
    pub message: Option<String>,
    pub value: Option<String>,
    #[serde(default)]
    pub encoding: Encoding,
}

/// Per-run counters persisted next to the record table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub tool_version: String,
    pub config_hash: String,
    pub evidence_path: String,
    pub bytes_scanned: u64,
    pub chunks_processed: u64,
    pub string_spans: u64,
    pub records_emitted: u64,
    pub urls: u64,
    pub steamids: u64,
    pub chats: u64,
    pub strings: u64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn count(&mut self, kind: RecordKind) {
        self.records_emitted += 1;
        match kind {
            RecordKind::Url => self.urls += 1,
            RecordKind::Steamid => self.steamids += 1,
            RecordKind::Chat => self.chats += 1,
            RecordKind::String => self.strings += 1,
        }
    }
}
