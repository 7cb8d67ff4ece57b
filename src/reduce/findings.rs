//! Aggregates over the clean table and their sectioned CSV rendering.

use std::collections::{HashMap, HashSet};

use crate::config::ReduceConfig;
use crate::record::RecordKind;

use super::ReduceError;
use super::table::CleanRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainCount {
    pub domain: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SteamIdFinding {
    pub steamid: u64,
    pub first_offset: u64,
    /// Timestamp of the first row the identifier appeared on, if it had one.
    pub first_seen: Option<String>,
    pub occurrences: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSample {
    pub timestamp: Option<String>,
    pub message: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Findings {
    pub domains: Vec<DomainCount>,
    pub steamids: Vec<SteamIdFinding>,
    pub chats: Vec<ChatSample>,
}

/// Accumulates findings one clean row at a time, in table order.
pub struct FindingsBuilder {
    top_domains: usize,
    chat_sample: usize,
    domain_index: HashMap<String, usize>,
    domains: Vec<DomainCount>,
    steamid_index: HashMap<u64, usize>,
    steamids: Vec<SteamIdFinding>,
    chat_seen: HashSet<String>,
    chats: Vec<ChatSample>,
}

impl FindingsBuilder {
    pub fn new(cfg: &ReduceConfig) -> Self {
        Self {
            top_domains: cfg.top_domains,
            chat_sample: cfg.chat_sample,
            domain_index: HashMap::new(),
            domains: Vec::new(),
            steamid_index: HashMap::new(),
            steamids: Vec::new(),
            chat_seen: HashSet::new(),
            chats: Vec::new(),
        }
    }

    pub fn observe(&mut self, row: &CleanRow) {
        if row.kind == RecordKind::Url {
            if let Some(domain) = row.domain.as_deref().filter(|d| !d.is_empty()) {
                match self.domain_index.get(domain) {
                    Some(&idx) => self.domains[idx].count += 1,
                    None => {
                        self.domain_index
                            .insert(domain.to_string(), self.domains.len());
                        self.domains.push(DomainCount {
                            domain: domain.to_string(),
                            count: 1,
                        });
                    }
                }
            }
        }

        if let Some(steamid) = row.steamid {
            match self.steamid_index.get(&steamid) {
                Some(&idx) => self.steamids[idx].occurrences += 1,
                None => {
                    self.steamid_index.insert(steamid, self.steamids.len());
                    self.steamids.push(SteamIdFinding {
                        steamid,
                        first_offset: row.offset,
                        first_seen: row.timestamp.clone(),
                        occurrences: 1,
                    });
                }
            }
        }

        if row.kind == RecordKind::Chat && self.chats.len() < self.chat_sample {
            if let Some(message) = row.message.as_deref() {
                if self.chat_seen.insert(message.to_string()) {
                    self.chats.push(ChatSample {
                        timestamp: row.timestamp.clone(),
                        message: message.to_string(),
                        offset: row.offset,
                    });
                }
            }
        }
    }

    pub fn finish(self) -> Findings {
        let mut domains = self.domains;
        // Stable: equal counts keep first-seen order.
        domains.sort_by(|a, b| b.count.cmp(&a.count));
        domains.truncate(self.top_domains);
        Findings {
            domains,
            steamids: self.steamids,
            chats: self.chats,
        }
    }
}

fn offset_hex(offset: u64) -> String {
    format!("0x{offset:X}")
}

fn csv_section<I>(out: &mut Vec<u8>, title: &str, header: &[&str], rows: I) -> Result<(), ReduceError>
where
    I: IntoIterator<Item = Vec<String>>,
{
    out.extend_from_slice(title.as_bytes());
    out.push(b'\n');
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ReduceError::Write(err.into_error()))?;
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Render the findings as one CSV document with a titled section per
/// aggregate. Output depends only on `findings` and `chat_sample`.
pub fn render_findings(findings: &Findings, chat_sample: usize) -> Result<Vec<u8>, ReduceError> {
    let mut out = Vec::new();
    out.extend_from_slice(b"# Summary (top findings)\n\n");

    csv_section(
        &mut out,
        "## Top URL domains",
        &["domain", "url_count"],
        findings
            .domains
            .iter()
            .map(|d| vec![d.domain.clone(), d.count.to_string()]),
    )?;

    out.push(b'\n');
    csv_section(
        &mut out,
        "## SteamIDs found",
        &["steamid", "first_seen", "offset", "offset_hex", "occurrences"],
        findings.steamids.iter().map(|s| {
            vec![
                s.steamid.to_string(),
                s.first_seen.clone().unwrap_or_default(),
                s.first_offset.to_string(),
                offset_hex(s.first_offset),
                s.occurrences.to_string(),
            ]
        }),
    )?;

    out.push(b'\n');
    csv_section(
        &mut out,
        &format!("## Sample chat lines (up to {chat_sample})"),
        &["timestamp", "message", "offset", "offset_hex"],
        findings.chats.iter().map(|c| {
            vec![
                c.timestamp.clone().unwrap_or_default(),
                c.message.clone(),
                c.offset.to_string(),
                offset_hex(c.offset),
            ]
        }),
    )?;

    Ok(out)
}
