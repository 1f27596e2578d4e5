pub mod parsers;
pub mod retry;
pub mod serde;
pub mod service;

/// Shortens a `0x`-prefixed hash for log lines: `0x1234…cdef`.
pub fn trim_hash(hash: &impl std::fmt::Display) -> String {
    let s = hash.to_string();
    if s.len() <= 14 || !s.is_ascii() {
        return s;
    }
    let (prefix, rest) = s.split_at(6);
    format!("{prefix}…{}", &rest[rest.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_hash() {
        assert_eq!(trim_hash(&"0x1234567890abcdef"), "0x1234…cdef");
        assert_eq!(trim_hash(&"0x12"), "0x12");
    }
}
