/// A single parsed SSE line: either an `event: ` or a `data: ` line. Blank
/// lines and anything else are not represented here — callers skip them.
#[derive(Debug, Clone)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(rest) = line.strip_prefix("event:") {
        return Some(SseParsed::Event(rest.trim().to_string()));
    }
    if let Some(rest) = line.strip_prefix("data:") {
        return Some(SseParsed::Data(rest.trim().to_string()));
    }
    None
}
