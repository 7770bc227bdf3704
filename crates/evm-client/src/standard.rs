//! Production [`ChainClient`] over an alloy [`Provider`].
//!
//! This is the single place where RPC wire types are converted into the
//! crate-owned types of [`crate::types`]. JSON-RPC error payloads are carried
//! into [`ClientError::Rpc`] verbatim so that
//! [`crate::split::classify_range_error`] can act on provider messages.
//!
//! Every call records the `rpc_request_duration_seconds` histogram labelled
//! by method and network.

use std::time::Instant;

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionResponse;
use alloy::providers::Provider;
use alloy::rpc::types::{BlockTransactions, Filter};
use alloy::transports::TransportError;
use async_trait::async_trait;
use metrics::histogram;
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::traits::ChainClient;
use crate::types::{Block, Log, LogFilter, Transaction};

// ═══════════════════════════════════════════════════════════════════════════════
// ALLOY CHAIN CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// [`ChainClient`] implementation backed by any alloy provider.
#[derive(Debug, Clone)]
pub struct AlloyChainClient<P> {
    /// RPC provider (alloy).
    provider: P,
    /// Network name, used as a metrics label.
    network: String,
}

impl<P> AlloyChainClient<P>
where
    P: Provider,
{
    /// Create a client over `provider`, labelling metrics with `network`.
    pub fn new(provider: P, network: impl Into<String>) -> Self {
        Self {
            provider,
            network: network.into(),
        }
    }

    /// Network name used for metrics labels.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Highest finalized block number according to the node.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the node reports no
    /// finalized block.
    pub async fn finalized_block_number(&self) -> Result<u64> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Finalized)
            .await
            .map_err(convert_error)?
            .ok_or_else(|| ClientError::InvalidResponse("node has no finalized block".into()))?;
        Ok(block.header.number)
    }

    fn record_duration(&self, method: &'static str, started: Instant) {
        histogram!(
            "rpc_request_duration_seconds",
            "method" => method,
            "network" => self.network.clone()
        )
        .record(started.elapsed().as_secs_f64());
    }
}

#[async_trait]
impl<P> ChainClient for AlloyChainClient<P>
where
    P: Provider,
{
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let rpc_filter = to_rpc_filter(filter);
        let started = Instant::now();
        let result = self.provider.get_logs(&rpc_filter).await;
        self.record_duration("eth_getLogs", started);

        let logs = result.map_err(convert_error)?;
        debug!(
            from_block = filter.from_block,
            to_block = filter.to_block,
            count = logs.len(),
            "eth_getLogs"
        );
        logs.into_iter().map(convert_log).collect()
    }

    async fn get_block_with_txs(&self, number: u64) -> Result<Option<Block>> {
        let started = Instant::now();
        let result = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await;
        self.record_duration("eth_getBlockByNumber", started);

        result.map_err(convert_error)?.map(convert_block).transpose()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE-TYPE CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Translate a crate filter into an alloy RPC filter.
fn to_rpc_filter(filter: &LogFilter) -> Filter {
    let mut rpc = Filter::new()
        .from_block(filter.from_block)
        .to_block(filter.to_block);
    if let Some(address) = &filter.address {
        rpc = rpc.address(address.clone());
    }
    let [topic0, topic1, topic2, topic3] = &filter.topics;
    if let Some(values) = topic0 {
        rpc = rpc.event_signature(values.clone());
    }
    if let Some(values) = topic1 {
        rpc = rpc.topic1(values.clone());
    }
    if let Some(values) = topic2 {
        rpc = rpc.topic2(values.clone());
    }
    if let Some(values) = topic3 {
        rpc = rpc.topic3(values.clone());
    }
    rpc
}

/// Translate a transport error, preserving JSON-RPC payloads for
/// classification.
fn convert_error(error: TransportError) -> ClientError {
    if let Some(payload) = error.as_error_resp() {
        return ClientError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
            data: payload.data.as_ref().map(|data| data.get().to_string()),
        };
    }
    ClientError::Transport(error.to_string())
}

fn missing(field: &str) -> ClientError {
    ClientError::InvalidResponse(format!("log response missing {field}"))
}

fn convert_log(log: alloy::rpc::types::Log) -> Result<Log> {
    Ok(Log {
        address: log.inner.address,
        topics: log.inner.data.topics().to_vec(),
        data: log.inner.data.data.clone(),
        block_number: log.block_number.ok_or_else(|| missing("block_number"))?,
        block_hash: log.block_hash.ok_or_else(|| missing("block_hash"))?,
        transaction_hash: log
            .transaction_hash
            .ok_or_else(|| missing("transaction_hash"))?,
        transaction_index: log
            .transaction_index
            .ok_or_else(|| missing("transaction_index"))?,
        log_index: log.log_index.ok_or_else(|| missing("log_index"))?,
    })
}

fn convert_block(block: alloy::rpc::types::Block) -> Result<Block> {
    let transactions = match block.transactions {
        BlockTransactions::Full(transactions) => transactions
            .into_iter()
            .map(convert_transaction)
            .collect::<Result<Vec<_>>>()?,
        BlockTransactions::Hashes(_) | BlockTransactions::Uncle => {
            return Err(ClientError::InvalidResponse(
                "block response missing full transactions".into(),
            ));
        }
    };

    Ok(Block {
        number: block.header.number,
        hash: block.header.hash,
        parent_hash: block.header.parent_hash,
        timestamp: block.header.timestamp,
        transactions,
    })
}

fn convert_transaction<T: TransactionResponse>(tx: T) -> Result<Transaction> {
    Ok(Transaction {
        hash: tx.tx_hash(),
        block_number: tx
            .block_number()
            .ok_or_else(|| missing("transaction block_number"))?,
        block_hash: tx
            .block_hash()
            .ok_or_else(|| missing("transaction block_hash"))?,
        transaction_index: tx
            .transaction_index()
            .ok_or_else(|| missing("transaction transaction_index"))?,
        from: tx.from(),
        to: tx.to(),
    })
}
