//! Resilient `eth_getLogs` with provider-aware range splitting.
//!
//! Public RPC providers cap `eth_getLogs` in incompatible ways: by response
//! size, by result count, or by block-range width, each with its own error
//! message. Some include a usable range suggestion in the message, some only
//! name the limit. [`get_logs_in_range`] hides all of that: it drives a
//! worklist of sub-windows, splitting whenever a recognised limit error comes
//! back, until every window succeeds. Unrecognised errors propagate to the
//! caller untouched.
//!
//! # Recognised provider limits
//!
//! | Error message contains | Split |
//! |------------------------|-------|
//! | `response size exceeded` + suggested `[a, b]` | `[a, b]`, `[b+1, to]` |
//! | `more than 10000 results` + suggested `[a, b]` | `[a, b]`, `[b+1, to]` |
//! | `block range less than 20000` | midpoint |
//! | `limited to a 10,000 blocks range` | midpoint |
//!
//! Suggested ranges are parsed defensively (hex or decimal, optional quotes
//! and whitespace); anything malformed or non-shrinking falls back to a
//! midpoint split.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::traits::ChainClient;
use crate::types::{Log, LogFilter};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// How to split a failed `eth_getLogs` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSplit {
    /// The provider suggested a first window `[start, end]`.
    Suggested {
        /// Start of the suggested window.
        start: u64,
        /// End of the suggested window (inclusive).
        end: u64,
    },
    /// No usable suggestion; halve the window.
    Midpoint,
}

// Alchemy: "Log response size exceeded. this block range should work: [0x..., 0x...]"
static SUGGESTED_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    // Pattern is a literal, exercised by the tests below.
    #[allow(clippy::unwrap_used)]
    let pattern = Regex::new(
        r#"(?i)this block range should work:\s*\[\s*"?(0x[0-9a-fA-F]+|\d+)"?\s*,\s*"?(0x[0-9a-fA-F]+|\d+)"?\s*\]"#,
    )
    .unwrap();
    pattern
});

// Infura / Tenderly: "query returned more than 10000 results. Try with this
// block range [0x..., 0x...]."
static RETRY_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    // Pattern is a literal, exercised by the tests below.
    #[allow(clippy::unwrap_used)]
    let pattern = Regex::new(
        r#"(?i)try with this block range\s*\[\s*"?(0x[0-9a-fA-F]+|\d+)"?\s*,\s*"?(0x[0-9a-fA-F]+|\d+)"?\s*\]"#,
    )
    .unwrap();
    pattern
});

/// Classify an `eth_getLogs` failure.
///
/// Returns `Some` when the error is a recognised provider range/size limit
/// (the window should be split and retried), `None` when it is fatal for the
/// request and must propagate.
#[must_use]
pub fn classify_range_error(error: &ClientError) -> Option<RangeSplit> {
    let ClientError::Rpc { message, data, .. } = error else {
        return None;
    };
    // Some providers put the useful text in the data field.
    let haystack = match data {
        Some(data) => format!("{message} {data}"),
        None => message.clone(),
    };

    if haystack.contains("response size exceeded") {
        return Some(suggested_range(&haystack).unwrap_or(RangeSplit::Midpoint));
    }
    if haystack.contains("more than 10000 results") {
        return Some(suggested_range(&haystack).unwrap_or(RangeSplit::Midpoint));
    }
    if haystack.contains("block range less than 20000")
        || haystack.contains("limited to a 10,000 blocks range")
    {
        return Some(RangeSplit::Midpoint);
    }

    None
}

/// Extract a suggested `[start, end]` window from an error message, if any.
fn suggested_range(haystack: &str) -> Option<RangeSplit> {
    let captures = SUGGESTED_RANGE
        .captures(haystack)
        .or_else(|| RETRY_RANGE.captures(haystack))?;
    let start = parse_block_number(captures.get(1)?.as_str())?;
    let end = parse_block_number(captures.get(2)?.as_str())?;
    Some(RangeSplit::Suggested { start, end })
}

/// Parse a block number in either `0x`-prefixed hex or decimal form.
fn parse_block_number(text: &str) -> Option<u64> {
    text.strip_prefix("0x").map_or_else(
        || text.parse().ok(),
        |hex| u64::from_str_radix(hex, 16).ok(),
    )
}

impl RangeSplit {
    /// Resolve this split into two concrete sub-windows of `[from, to]`.
    ///
    /// Returns `None` when the window cannot shrink any further (a single
    /// block); the original error is then fatal. A suggestion that does not
    /// start at `from`, is inverted, or fails to shrink the window degrades
    /// to a midpoint split rather than risking skipped blocks.
    #[must_use]
    pub fn windows(self, from: u64, to: u64) -> Option<[(u64, u64); 2]> {
        if let Self::Suggested { start, end } = self
            && start == from
            && start <= end
            && end < to
        {
            return Some([(start, end), (end + 1, to)]);
        }
        if from == to {
            return None;
        }
        let mid = from + (to - from) / 2;
        Some([(from, mid), (mid + 1, to)])
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SPLITTING FETCH
// ═══════════════════════════════════════════════════════════════════════════════

/// Fetch all logs matching `filter`, splitting the window on provider limits.
///
/// Sub-windows are processed in ascending block order, so the returned logs
/// are ordered by the window that produced them. Splitting recurses until
/// every sub-window succeeds or an unrecognised error surfaces.
///
/// # Errors
///
/// Propagates the first error that is not a recognised range limit, and a
/// range-limit error on a single-block window (which cannot shrink).
pub async fn get_logs_in_range<C: ChainClient + ?Sized>(
    client: &C,
    filter: &LogFilter,
) -> Result<Vec<Log>> {
    let mut windows = VecDeque::from([(filter.from_block, filter.to_block)]);
    let mut logs = Vec::new();

    while let Some((from, to)) = windows.pop_front() {
        let window = filter.with_range(from, to);
        match client.get_logs(&window).await {
            Ok(batch) => {
                debug!(from, to, count = batch.len(), "fetched logs window");
                logs.extend(batch);
            }
            Err(error) => {
                let Some(split) = classify_range_error(&error) else {
                    return Err(error);
                };
                let Some([first, second]) = split.windows(from, to) else {
                    return Err(error);
                };
                debug!(
                    from,
                    to,
                    retry_from = first.0,
                    retry_to = first.1,
                    "provider rejected getLogs window, splitting"
                );
                windows.push_front(second);
                windows.push_front(first);
            }
        }
    }

    Ok(logs)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChainClient;
    use alloy::primitives::Address;

    fn rpc_error(message: &str) -> ClientError {
        ClientError::rpc(-32602, message, None)
    }

    #[test]
    fn classifies_response_size_with_hex_suggestion() {
        let err = rpc_error(
            "Log response size exceeded. this block range should work: [0x64, 0x190]",
        );
        assert_eq!(
            classify_range_error(&err),
            Some(RangeSplit::Suggested {
                start: 0x64,
                end: 0x190
            })
        );
    }

    #[test]
    fn classifies_response_size_with_decimal_suggestion() {
        let err =
            rpc_error("Log response size exceeded. this block range should work: [0, 400]");
        assert_eq!(
            classify_range_error(&err),
            Some(RangeSplit::Suggested { start: 0, end: 400 })
        );
    }

    #[test]
    fn tolerates_quotes_and_whitespace() {
        let err = rpc_error(
            r#"query returned more than 10000 results. Try with this block range [ "0x0" , "0x1f4" ]"#,
        );
        assert_eq!(
            classify_range_error(&err),
            Some(RangeSplit::Suggested { start: 0, end: 500 })
        );
    }

    #[test]
    fn reads_suggestion_from_data_field() {
        let err = ClientError::rpc(
            -32005,
            "Log response size exceeded.",
            Some(r#""this block range should work: [0x0, 0xff]""#.into()),
        );
        assert_eq!(
            classify_range_error(&err),
            Some(RangeSplit::Suggested { start: 0, end: 255 })
        );
    }

    #[test]
    fn malformed_suggestion_falls_back_to_midpoint() {
        let err = rpc_error(
            "Log response size exceeded. this block range should work: [0xzz, oops]",
        );
        assert_eq!(classify_range_error(&err), Some(RangeSplit::Midpoint));
    }

    #[test]
    fn classifies_width_limits_as_midpoint() {
        let err = rpc_error("eth_getLogs requires a block range less than 20000");
        assert_eq!(classify_range_error(&err), Some(RangeSplit::Midpoint));

        let err = rpc_error("eth_getLogs is limited to a 10,000 blocks range");
        assert_eq!(classify_range_error(&err), Some(RangeSplit::Midpoint));
    }

    #[test]
    fn unknown_errors_are_fatal() {
        assert_eq!(classify_range_error(&rpc_error("execution reverted")), None);
        assert_eq!(
            classify_range_error(&ClientError::Transport("connection reset".into())),
            None
        );
    }

    #[test]
    fn suggested_windows_cover_the_range() {
        let split = RangeSplit::Suggested { start: 0, end: 400 };
        assert_eq!(split.windows(0, 1000), Some([(0, 400), (401, 1000)]));
    }

    #[test]
    fn non_shrinking_suggestion_degrades_to_midpoint() {
        // Suggestion equal to the full range would loop forever.
        let split = RangeSplit::Suggested { start: 0, end: 1000 };
        assert_eq!(split.windows(0, 1000), Some([(0, 500), (501, 1000)]));

        // Suggestion not anchored at `from` would skip blocks.
        let split = RangeSplit::Suggested { start: 10, end: 400 };
        assert_eq!(split.windows(0, 1000), Some([(0, 500), (501, 1000)]));
    }

    #[test]
    fn midpoint_windows() {
        assert_eq!(RangeSplit::Midpoint.windows(0, 9), Some([(0, 4), (5, 9)]));
        assert_eq!(RangeSplit::Midpoint.windows(7, 8), Some([(7, 7), (8, 8)]));
        assert_eq!(RangeSplit::Midpoint.windows(7, 7), None);
    }

    #[tokio::test]
    async fn splits_on_suggested_range_and_concatenates() {
        let client = MockChainClient::new();
        let address = Address::repeat_byte(0xAA);
        client.add_simple_log(address, 100, 1);
        client.add_simple_log(address, 900, 2);
        client.script_get_logs_failure(
            0,
            1000,
            rpc_error("Log response size exceeded. this block range should work: [0, 400]"),
        );

        let filter = LogFilter::new(0, 1000).with_address(vec![address]);
        let logs = get_logs_in_range(&client, &filter).await.unwrap();

        assert_eq!(
            logs.iter().map(|l| l.block_number).collect::<Vec<_>>(),
            vec![100, 900]
        );
        assert_eq!(client.get_logs_calls(), vec![(0, 1000), (0, 400), (401, 1000)]);
    }

    #[tokio::test]
    async fn splits_recursively_until_windows_succeed() {
        let client = MockChainClient::new();
        client.script_get_logs_failure(0, 100, rpc_error("block range less than 20000"));
        client.script_get_logs_failure(0, 50, rpc_error("block range less than 20000"));

        let filter = LogFilter::new(0, 100);
        get_logs_in_range(&client, &filter).await.unwrap();

        assert_eq!(
            client.get_logs_calls(),
            vec![(0, 100), (0, 50), (0, 25), (26, 50), (51, 100)]
        );
    }

    #[tokio::test]
    async fn fatal_errors_propagate() {
        let client = MockChainClient::new();
        client.script_get_logs_failure(0, 10, rpc_error("execution reverted"));

        let err = get_logs_in_range(&client, &LogFilter::new(0, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Rpc { .. }));
        assert_eq!(client.get_logs_calls(), vec![(0, 10)]);
    }
}
