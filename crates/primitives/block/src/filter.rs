use crate::Log;
use alloy::primitives::{Address, B256};

/// A resolved `eth_getLogs` filter over canonical blocks.
///
/// Topic matching is positional: an empty position is a wildcard, candidates within a position are OR-ed,
/// and positions are AND-ed. A filter with more positions than a log has topics never matches that log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogFilter {
    pub from_block: u64,
    pub to_block: u64,
    pub addresses: Vec<Address>,
    pub topics: Vec<Vec<B256>>,
}

impl LogFilter {
    pub fn matches(&self, log: &Log) -> bool {
        (self.from_block..=self.to_block).contains(&log.block_number)
            && self.matches_address(&log.address)
            && self.matches_topics(&log.topics)
    }

    pub fn matches_address(&self, address: &Address) -> bool {
        self.addresses.is_empty() || self.addresses.contains(address)
    }

    pub fn matches_topics(&self, topics: &[B256]) -> bool {
        if self.topics.len() > topics.len() {
            return false;
        }
        self.topics
            .iter()
            .zip(topics)
            .all(|(pattern, topic)| pattern.is_empty() || pattern.contains(topic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;
    use rstest::*;

    const ADDRESS: Address = Address::with_last_byte(0xaa);

    fn topic(n: u8) -> B256 {
        B256::with_last_byte(n)
    }

    #[fixture]
    fn log() -> Log {
        Log {
            address: ADDRESS,
            topics: vec![topic(1), topic(2), topic(3)],
            data: Bytes::new(),
            block_hash: B256::ZERO,
            block_number: 10,
            transaction_hash: B256::ZERO,
            transaction_index: 0,
            log_index: 0,
            transaction_log_index: 0,
        }
    }

    fn filter(addresses: Vec<Address>, topics: Vec<Vec<B256>>) -> LogFilter {
        LogFilter { from_block: 0, to_block: 100, addresses, topics }
    }

    #[rstest]
    #[case::no_filter(vec![], vec![], true)]
    #[case::address(vec![ADDRESS], vec![], true)]
    #[case::address_set(vec![Address::ZERO, ADDRESS], vec![], true)]
    #[case::wrong_address(vec![Address::ZERO], vec![], false)]
    #[case::first_topic(vec![], vec![vec![topic(1)]], true)]
    #[case::wildcard_then_topic(vec![], vec![vec![], vec![topic(2)]], true)]
    #[case::or_within_position(vec![], vec![vec![topic(9), topic(1)]], true)]
    #[case::and_across_positions(vec![], vec![vec![topic(1)], vec![topic(9)]], false)]
    #[case::all_positions(vec![], vec![vec![topic(1)], vec![topic(2)], vec![topic(3)]], true)]
    #[case::more_positions_than_topics(vec![], vec![vec![], vec![], vec![], vec![]], false)]
    fn test_log_filter(
        log: Log,
        #[case] addresses: Vec<Address>,
        #[case] topics: Vec<Vec<B256>>,
        #[case] expected: bool,
    ) {
        assert_eq!(filter(addresses, topics).matches(&log), expected);
    }

    #[rstest]
    fn test_log_filter_block_range(log: Log) {
        assert!(LogFilter { from_block: 10, to_block: 10, ..Default::default() }.matches(&log));
        assert!(!LogFilter { from_block: 11, to_block: 20, ..Default::default() }.matches(&log));
    }
}
