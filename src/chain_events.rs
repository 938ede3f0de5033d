//! On-chain ABI surface the relayer reads and writes (§6): the incentivized
//! escrow's lifecycle events and its single write entrypoint, plus the
//! LayerZero endpoint's packet event. Declared inline with `sol!` rather
//! than against an ABI JSON file — there is no externally published ABI for
//! an invented contract surface, only the shapes this spec names.

use alloy_sol_types::sol;

sol! {
    /// Emitted on the source chain when a bounty-bearing message is created.
    event BountyPlaced(
        bytes32 indexed messageIdentifier,
        uint256 maxGasDelivery,
        uint256 maxGasAck,
        address refundGasTo,
        uint256 priceOfDeliveryGas,
        uint256 priceOfAckGas,
        uint256 targetDelta,
        address sourceAddress
    );

    /// Emitted on the destination chain once `processPacket` has executed
    /// the message. Carries `fromChainId` since the Getter observing this
    /// log runs against the destination chain, not the chain the bounty
    /// originated on.
    event MessageDelivered(bytes32 indexed messageIdentifier, uint256 fromChainId);

    /// Emitted on the source chain once the return-leg ack has been
    /// processed and the bounty is claimed.
    event BountyClaimed(bytes32 indexed messageIdentifier);

    /// Emitted on the source chain when a bounty's gas prices are topped up.
    event BountyIncreased(
        bytes32 indexed messageIdentifier,
        uint256 newDeliveryGasPrice,
        uint256 newAckGasPrice
    );

    /// Mock AMB: the escrow emits the raw application message directly,
    /// with no on-chain attestation step (§4.6).
    event Message(uint256 indexed destinationIdentifier, bytes32 recipient, bytes message);

    /// LayerZero V2 endpoint event; `encodedPacket` is the ABI-encoded
    /// outer packet tuple decoded by [`Packet`] below.
    event PacketSent(bytes encodedPacket, bytes options, address sendLibrary);

    /// The incentivized escrow's sole write entrypoint.
    function processPacket(bytes calldata messageCtx, bytes calldata message, address refundGasTo) external;

    /// Outer LayerZero V2 packet tuple, ABI-decoded from `PacketSent.encodedPacket`.
    struct Packet {
        uint64 nonce;
        uint32 srcEid;
        address sender;
        uint32 dstEid;
        address receiver;
        bytes32 guid;
        bytes message;
    }
}
