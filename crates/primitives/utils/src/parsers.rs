use anyhow::{bail, Context};
use std::time::Duration;
use url::Url;

/// Parses a duration such as `500ms`, `10s`, `5min` or `2h`.
pub fn parse_duration(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, suffix) = s.split_at(split);
    let value: u64 = value.parse().with_context(|| format!("Invalid duration value: {s:?}"))?;

    match suffix {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "min" => Ok(Duration::from_secs(value.saturating_mul(60))),
        "h" => Ok(Duration::from_secs(value.saturating_mul(3600))),
        _ => bail!("Invalid duration suffix in {s:?}, expected one of ms, s, min, h"),
    }
}

pub fn parse_url(s: &str) -> anyhow::Result<Url> {
    s.parse().with_context(|| format!("Invalid url: {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("250ms", Duration::from_millis(250))]
    #[case("10s", Duration::from_secs(10))]
    #[case("5min", Duration::from_secs(300))]
    #[case("2h", Duration::from_secs(7200))]
    fn test_parse_duration(#[case] input: &str, #[case] expected: Duration) {
        assert_eq!(parse_duration(input).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case("10")]
    #[case("s")]
    #[case("10 days")]
    fn test_parse_duration_rejects(#[case] input: &str) {
        assert!(parse_duration(input).is_err());
    }
}
