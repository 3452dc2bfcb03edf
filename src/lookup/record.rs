/// One result row from the lookup service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRecord {
    /// Record number, digits only
    pub number: String,
    pub name: String,
    pub message: String,
}

const NAME_OPEN: &str = ": {";
const SEPARATOR: &str = "} said {";

/// Parses a reply line containing `<digits>: {<name>} said {<message>}`.
///
/// The match is unanchored: the record starts at the first run of digits
/// followed by `: {` for which the rest of the line fits, so padding or any
/// other prefix is skipped. Name and message are matched greedily: the
/// message ends at the last `}` on the line and the name ends at the last
/// `} said {` before it. Returns `None` when no such record is present.
pub fn parse_record(line: &str) -> Option<LookupRecord> {
    line.match_indices(NAME_OPEN).find_map(|(open, _)| {
        let head = &line[..open];
        let digits = head.bytes().rev().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return None;
        }
        let (name, message) = split_body(&line[open + NAME_OPEN.len()..])?;

        Some(LookupRecord {
            number: head[head.len() - digits..].to_string(),
            name: name.to_string(),
            message: message.to_string(),
        })
    })
}

fn split_body(rest: &str) -> Option<(&str, &str)> {
    let close = rest.rfind('}')?;
    let inner = &rest[..close];
    let split = inner.rfind(SEPARATOR)?;
    Some((&inner[..split], &inner[split + SEPARATOR.len()..]))
}
