use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const METRICS_ADDR: &str = "ALGOWATCH_METRICS_ADDR";

const DEFAULT_METRICS_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 9967);

pub fn get_default_metrics_addr() -> SocketAddr {
    DEFAULT_METRICS_ADDR
}

pub fn get_metrics_addr() -> SocketAddr {
    let addr_from_env = std::env::var(METRICS_ADDR);
    addr_from_env.map_or(DEFAULT_METRICS_ADDR, |res| {
        res.parse().unwrap_or(DEFAULT_METRICS_ADDR)
    })
}

/// Shorten `text` to at most `max` bytes on a char boundary, marking the cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
