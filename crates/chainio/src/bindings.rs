//! Contract bindings for the consensus contract and the devnet factories.

use alloy::sol;

sol! {
    interface IConsensus {
        function submitClaim(
            address appContract,
            uint256 lastProcessedBlockNumber,
            bytes32 claim
        ) external;

        event ClaimSubmission(
            address indexed submitter,
            address indexed appContract,
            uint256 lastProcessedBlockNumber,
            bytes32 claim
        );
    }

    interface IAuthorityFactory {
        function newAuthority(
            address authorityOwner,
            uint256 epochLength,
            bytes32 salt
        ) external returns (address);

        event AuthorityCreated(address authority);
    }

    interface IApplicationFactory {
        function newApplication(
            address consensus,
            address appOwner,
            bytes32 templateHash,
            bytes32 salt
        ) external returns (address);

        event ApplicationCreated(
            address indexed consensus,
            address appOwner,
            bytes32 templateHash,
            address appContract
        );
    }
}
