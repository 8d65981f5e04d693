//! Devnet bootstrap: deploy a consensus authority and an application
//! through the factory contracts when none are configured.

use alloy::{
    primitives::{Address, B256, U256},
    rpc::types::Log,
    sol_types::{SolCall, SolEvent},
};
use tracing::*;

use crate::{
    bindings::{IApplicationFactory, IAuthorityFactory},
    client::EthClient,
    traits::ConsensusTransactor,
    ChainError, ChainResult,
};

/// Addresses materialized by the bootstrap.
#[derive(Copy, Clone, Debug)]
pub struct DevnetAddresses {
    pub consensus: Address,
    pub app: Address,
}

/// Creates an authority consensus instance and an application bound to it,
/// returning both addresses. The factory contracts are assumed predeployed
/// on the dev chain.
pub async fn bootstrap_devnet(
    client: &EthClient,
    authority_factory: Address,
    application_factory: Address,
    owner: Address,
    epoch_length: u64,
) -> ChainResult<DevnetAddresses> {
    let consensus = create_authority(client, authority_factory, owner, epoch_length).await?;
    info!(%consensus, "authority consensus created");

    let app = create_application(client, application_factory, consensus, owner).await?;
    info!(%app, "application created");

    Ok(DevnetAddresses { consensus, app })
}

async fn create_authority(
    client: &EthClient,
    factory: Address,
    owner: Address,
    epoch_length: u64,
) -> ChainResult<Address> {
    let call = IAuthorityFactory::newAuthorityCall {
        authorityOwner: owner,
        epochLength: U256::from(epoch_length),
        salt: B256::ZERO,
    };
    let mined = send_and_mine(client, factory, call.abi_encode()).await?;

    mined
        .logs
        .iter()
        .filter_map(decode_authority_created)
        .next()
        .ok_or(ChainError::MissingCreationEvent(mined.tx_hash))
}

async fn create_application(
    client: &EthClient,
    factory: Address,
    consensus: Address,
    owner: Address,
) -> ChainResult<Address> {
    let call = IApplicationFactory::newApplicationCall {
        consensus,
        appOwner: owner,
        templateHash: B256::ZERO,
        salt: B256::ZERO,
    };
    let mined = send_and_mine(client, factory, call.abi_encode()).await?;

    mined
        .logs
        .iter()
        .filter_map(decode_application_created)
        .next()
        .ok_or(ChainError::MissingCreationEvent(mined.tx_hash))
}

async fn send_and_mine(
    client: &EthClient,
    to: Address,
    calldata: Vec<u8>,
) -> ChainResult<crate::traits::MinedTx> {
    let tx_hash = client.send_call(to, calldata).await?;
    let mined = client.wait_mined(tx_hash).await?;
    if !mined.success {
        return Err(ChainError::TxReverted(tx_hash));
    }
    Ok(mined)
}

// Non-matching logs are skipped, same as the event scan after submitClaim.
fn decode_authority_created(log: &Log) -> Option<Address> {
    IAuthorityFactory::AuthorityCreated::decode_log(&log.inner, true)
        .ok()
        .map(|ev| ev.data.authority)
}

fn decode_application_created(log: &Log) -> Option<Address> {
    IApplicationFactory::ApplicationCreated::decode_log(&log.inner, true)
        .ok()
        .map(|ev| ev.data.appContract)
}
