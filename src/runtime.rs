//! Per-chain worker wiring and the process entrypoint (§5.1, §6).
//!
//! `ChainRuntime::spawn` is the "OS-level worker per (chain, service)" from
//! §5 made concrete: one task each for the Monitor, Getter, every configured
//! collector, the Wallet, and the Submitter, all sharing one [`Store`].

use std::sync::Arc;

use alloy_network::EthereumWallet;
use alloy_provider::ProviderBuilder;
use alloy_signer_local::PrivateKeySigner;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use crate::collector::layerzero::LayerZeroCollector;
use crate::collector::mock::MockCollector;
use crate::config::ResolvedChain;
use crate::error::{RelayerError, Result};
use crate::getter::Getter;
use crate::monitor::Monitor;
use crate::providers::{AlloyChainProvider, TokioClock};
use crate::store::{Store, StoreBackend};
use crate::submitter::Submitter;
use crate::traits::ChainProvider;
use crate::wallet::Wallet;

/// Every background task spawned for one chain.
pub struct ChainRuntime {
    chain_id: u64,
    handles: Vec<JoinHandle<Result<()>>>,
}

impl ChainRuntime {
    #[instrument(skip(chain, store, signer), fields(chain_id = chain.chain_id))]
    pub async fn spawn<B: StoreBackend + 'static>(chain: ResolvedChain, signer: PrivateKeySigner, store: Store<B>) -> Result<Self> {
        let signer_address = signer.address();
        let wallet = EthereumWallet::from(signer.clone());
        let rpc_url = chain
            .rpc
            .parse()
            .map_err(|e| RelayerError::InvalidConfig(format!("chain {}: invalid rpc url: {e}", chain.chain_id)))?;
        let alloy_provider = ProviderBuilder::new().wallet(wallet).connect_http(rpc_url);
        let provider = Arc::new(AlloyChainProvider::new(alloy_provider));
        let clock = Arc::new(TokioClock::new());

        let initial_balance = provider.get_balance(signer_address).await?;

        let monitor = Monitor::new(chain.chain_id, provider.clone(), clock.clone(), chain.getter.processing_interval);
        let monitor_rx = monitor.start().await?;

        let mut handles: Vec<JoinHandle<Result<()>>> = Vec::new();

        let wallet_handle = Wallet::spawn(chain.wallet.clone(), provider.clone(), clock.clone(), signer_address, initial_balance);

        let getter = Getter::new(chain.getter.clone(), provider.clone(), clock.clone(), store.clone(), monitor_rx.clone());
        handles.push(getter.spawn());

        for amb in &chain.ambs {
            match amb.name.as_str() {
                "mock" => {
                    let collector = MockCollector::new(
                        amb.collector.clone(),
                        provider.clone(),
                        clock.clone(),
                        store.clone(),
                        monitor_rx.clone(),
                        signer.clone(),
                    );
                    handles.push(collector.spawn());
                }
                "layerzero" => {
                    let collector =
                        LayerZeroCollector::new(amb.collector.clone(), provider.clone(), clock.clone(), store.clone(), monitor_rx.clone());
                    handles.push(collector.spawn());
                }
                other => {
                    return Err(RelayerError::InvalidConfig(format!("chain {}: unknown AMB '{other}'", chain.chain_id)));
                }
            }
        }

        if let Some(submitter_config) = chain.submitter.clone() {
            let submitter = Submitter::new(submitter_config, provider.clone(), clock.clone(), store.clone(), wallet_handle);
            for handle in submitter.spawn(store.clone()) {
                handles.push(tokio::spawn(async move { handle.await.map_err(|e| RelayerError::InvalidConfig(e.to_string())) }));
            }
        }

        Ok(Self { chain_id: chain.chain_id, handles })
    }

    /// Waits for every worker on this chain to finish. A Getter/Collector
    /// reaching its `stoppingBlock` returns `Ok(())`; anything else
    /// propagates as the chain's failure (§6 exit codes).
    pub async fn join(self) -> Result<()> {
        for handle in self.handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(chain_id = self.chain_id, %err, "chain worker exited with an error");
                    return Err(err);
                }
                Err(join_err) => {
                    error!(chain_id = self.chain_id, %join_err, "chain worker task panicked");
                    return Err(RelayerError::InvalidConfig(join_err.to_string()));
                }
            }
        }
        info!(chain_id = self.chain_id, "all workers exited cleanly");
        Ok(())
    }
}

/// Process entrypoint: loads config for `env`, spawns every chain, and
/// waits for all of them. Returns the process exit code per §6.
pub async fn run(env: &str) -> i32 {
    let config = match crate::config::RelayerConfig::load(env) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            return 1;
        }
    };

    crate::logging::init(&config.log_level);

    let signer: PrivateKeySigner = match config.private_key.parse() {
        Ok(signer) => signer,
        Err(err) => {
            error!(%err, "invalid relayer private key");
            return 1;
        }
    };

    let store = Store::new(crate::store::InMemoryBackend::new());

    let mut runtimes = Vec::with_capacity(config.chains.len());
    for chain in config.chains {
        match ChainRuntime::spawn(chain, signer.clone(), store.clone()).await {
            Ok(runtime) => runtimes.push(runtime),
            Err(err) => {
                error!(%err, "failed to start chain runtime");
                return 1;
            }
        }
    }

    for runtime in runtimes {
        if runtime.join().await.is_err() {
            return 1;
        }
    }

    0
}
