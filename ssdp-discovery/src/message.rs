use std::net::IpAddr;

/// Build an SSDP search request (M-SEARCH)
///
/// The header order and casing are what devices in the field expect;
/// do not reorder them.
#[must_use]
pub fn build_search(
    search_target: &str,
    group: IpAddr,
    port: u16,
    wait_hint: u64,
) -> String {
    let host = match group {
        IpAddr::V4(v4) => format!("{v4}:{port}"),
        IpAddr::V6(v6) => format!("[{v6}]:{port}"),
    };
    format!(
        "M-SEARCH * HTTP/1.1\r
MAN: \"ssdp:discover\"\r
HOST: {host}\r
ST: {search_target}\r
MX: {wait_hint}\r
\r\n"
    )
}

/// The first line of an HTTP-shaped message
pub(crate) fn status_line(text: &str) -> Option<&str> {
    text.lines().next()
}

/// Look up a header value, case-insensitively, trimmed
///
/// Only the first occurrence counts. The status line is never
/// treated as a header, and parsing stops at the blank line which
/// ends the headers.
pub(crate) fn header<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    text.lines()
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}
