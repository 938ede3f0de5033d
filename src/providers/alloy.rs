//! Alloy-based blockchain provider implementation.

use alloy_network::Ethereum;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::Provider;
use alloy_rpc_types::{Filter, Log, TransactionRequest};
use async_trait::async_trait;
use tracing::{debug, instrument, trace};

use crate::error::{RelayerError, Result};
use crate::traits::{ChainProvider, FeeData, LogFilter, TxReceipt};

/// Production chain provider wrapping an Alloy [`Provider`].
///
/// The wrapped provider is expected to carry a wallet filler (configured at
/// construction time via `ProviderBuilder::new().wallet(signer)`), so
/// `send_transaction` both signs and broadcasts.
#[derive(Debug, Clone)]
pub struct AlloyChainProvider<P: Provider<Ethereum> + Clone> {
    provider: P,
}

impl<P: Provider<Ethereum> + Clone> AlloyChainProvider<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn inner(&self) -> &P {
        &self.provider
    }
}

fn to_alloy_filter(filter: &LogFilter) -> Filter {
    Filter::new()
        .address(filter.address)
        .from_block(filter.from_block)
        .to_block(filter.to_block)
        .event_signature(filter.topic0.clone())
}

#[async_trait]
impl<P: Provider<Ethereum> + Clone + Send + Sync> ChainProvider for AlloyChainProvider<P> {
    #[instrument(skip(self))]
    async fn get_block_number(&self) -> Result<u64> {
        let block_number = self.provider.get_block_number().await?;
        trace!(block_number, "fetched current block number");
        Ok(block_number)
    }

    #[instrument(skip(self, filter), fields(from_block = filter.from_block, to_block = filter.to_block))]
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        let logs = self.provider.get_logs(&to_alloy_filter(filter)).await?;
        debug!(log_count = logs.len(), "fetched logs");
        Ok(logs)
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes> {
        self.provider
            .call(tx.clone())
            .await
            .map_err(|e| RelayerError::ContractCall(e.to_string()))
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64> {
        Ok(self.provider.estimate_gas(tx.clone()).await?)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        Ok(self.provider.get_transaction_count(address).await?)
    }

    async fn get_fee_data(&self) -> Result<FeeData> {
        let gas_price = self.provider.get_gas_price().await?;
        let eip1559 = self.provider.estimate_eip1559_fees().await.ok();

        Ok(FeeData {
            base_fee_per_gas: eip1559.map(|f| f.max_fee_per_gas - f.max_priority_fee_per_gas),
            max_priority_fee_per_gas: eip1559.map(|f| f.max_priority_fee_per_gas).unwrap_or(0),
            gas_price,
        })
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }

    #[instrument(skip(self, tx))]
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash> {
        let pending = self.provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "transaction broadcast");
        Ok(tx_hash)
    }

    async fn get_transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>> {
        let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? else {
            return Ok(None);
        };

        Ok(Some(TxReceipt {
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used as u64,
            effective_gas_price: receipt.effective_gas_price,
            status: receipt.status(),
        }))
    }
}
