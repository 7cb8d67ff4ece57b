mod common;

use std::fs;
use std::path::Path;

use steamcarve::config::ReduceConfig;
use steamcarve::reduce::{self, ReduceOutputs};

/// Rows as an older post-processing step wrote them: hex offsets, extra
/// columns, padded headers and mixed-case kinds.
const LEGACY_TABLE: &str = "\
kind , offset,preview,steamid,unix_ts,message,value,domain\n\
URL,0x1F4,https://steamcommunity.com/id/a,,,,https://steamcommunity.com/id/a,steamcommunity.com\n\
url,0x200,https://store.steampowered.com/app/10,,,,https://store.steampowered.com/app/10,\n\
url,0x300,https://steamcommunity.com/id/b,,,,https://steamcommunity.com/id/b,\n\
chat,0x400,1700000000000 gg wp,,1700000000000,gg wp,,\n\
chat,0x500,1700000005000 gg wp,,1700000005000,gg wp,,\n\
steamid,0x600,76561198000000000,76561198000000000,,,,\n\
chat,0x700,76561198000000000 1700000009000 trade?,76561198000000000,1700000009000,trade?,,\n\
string,0x800,just some text,,,,,\n";

fn reduce_into(input: &Path, out: &Path) -> ReduceOutputs {
    reduce::reduce_file(input, Some(out), &ReduceConfig::default()).expect("reduce")
}

#[test]
fn reducing_twice_gives_identical_bytes() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input = temp_dir.path().join("legacy.csv");
    fs::write(&input, LEGACY_TABLE).expect("write");

    let first = reduce_into(&input, &temp_dir.path().join("a"));
    let second = reduce_into(&input, &temp_dir.path().join("b"));
    assert_eq!(
        fs::read(&first.clean_path).expect("clean a"),
        fs::read(&second.clean_path).expect("clean b")
    );
    assert_eq!(
        fs::read(&first.findings_path).expect("findings a"),
        fs::read(&second.findings_path).expect("findings b")
    );

    let before = fs::read(&first.findings_path).expect("findings");
    let again = reduce_into(&input, &temp_dir.path().join("a"));
    assert_eq!(fs::read(&again.findings_path).expect("findings"), before);
}

#[test]
fn legacy_table_findings() {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let input = temp_dir.path().join("legacy.csv");
    fs::write(&input, LEGACY_TABLE).expect("write");

    let outputs = reduce_into(&input, temp_dir.path());
    assert_eq!(outputs.rows_read, 8);
    assert_eq!(outputs.rows_kept, 7);

    let domains: Vec<(&str, u64)> = outputs
        .findings
        .domains
        .iter()
        .map(|d| (d.domain.as_str(), d.count))
        .collect();
    assert_eq!(domains, vec![("steamcommunity.com", 2), ("steampowered.com", 1)]);

    let steamid = &outputs.findings.steamids[0];
    assert_eq!(steamid.first_offset, 0x600);
    assert_eq!(steamid.occurrences, 2);
    assert_eq!(outputs.findings.steamids.len(), 1);

    let chats: Vec<(&str, u64)> = outputs
        .findings
        .chats
        .iter()
        .map(|c| (c.message.as_str(), c.offset))
        .collect();
    assert_eq!(chats, vec![("gg wp", 0x400), ("trade?", 0x700)]);

    let findings = fs::read_to_string(&outputs.findings_path).expect("findings");
    assert!(findings.starts_with("# Summary (top findings)\n\n## Top URL domains\ndomain,url_count\n"));
    assert!(findings.contains("76561198000000000,,1536,0x600,2\n"));
}
