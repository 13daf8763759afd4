use std::sync::atomic::{AtomicUsize, Ordering};

use netcode_shared::{
    BitWrite, Connection, ConnectionId, DisconnectReason, Pipeline, Protocol, ProtocolVersion,
    ReceivedRpcs, ResolvedProtocol, RpcExecutorParameters, RpcPacketHeader, RpcQueue, Serde,
    SerdeErr, StreamWriter, PROTOCOL_VERSION_BYTES, PROTOCOL_VERSION_RPC_INDEX,
};
use netcode_test::{init_logger, protocol, Chat, LocalTransport, Ping, SpawnRequest};

const LINK: ConnectionId = ConnectionId(1);

fn resolved() -> ResolvedProtocol {
    protocol().resolve().unwrap()
}

/// Move every reliable packet in flight on the link into `to`
fn deliver(transport: &mut LocalTransport, to: &mut Connection) {
    for packet in transport.take_packets(Pipeline::Reliable, LINK) {
        to.receive_rpc_packet(&packet).unwrap();
    }
}

/// A reliable packet carrying the given raw RPC stream
fn rpc_packet(stream: &[u8]) -> Vec<u8> {
    let mut writer = StreamWriter::new();
    RpcPacketHeader::new(0, 0).ser(&mut writer);
    let mut packet = writer.to_bytes();
    packet.extend_from_slice(stream);
    packet
}

/// Raw handshake message, as `queue_protocol_version` writes it
fn handshake_message(version: &ProtocolVersion) -> Vec<u8> {
    let mut writer = StreamWriter::new();
    PROTOCOL_VERSION_RPC_INDEX.ser(&mut writer);
    (PROTOCOL_VERSION_BYTES as u16).ser(&mut writer);
    version.ser(&mut writer);
    writer.to_bytes()
}

#[test]
fn handshake_then_rpcs_are_delivered_in_order() {
    init_logger();
    let server = resolved();
    let client = resolved();
    let mut server_connection = server.new_connection(LINK);
    let mut client_connection = client.new_connection(LINK);
    let mut transport = LocalTransport::from_config(client.connection_config());

    RpcQueue::<Chat>::new()
        .schedule(&mut client_connection, client.rpcs(), &Chat::new("hello"))
        .unwrap();
    RpcQueue::<SpawnRequest>::new()
        .schedule(
            &mut client_connection,
            client.rpcs(),
            &SpawnRequest { x: -4, y: 12 },
        )
        .unwrap();
    RpcQueue::<Chat>::new()
        .schedule(&mut client_connection, client.rpcs(), &Chat::new("bye"))
        .unwrap();
    assert_eq!(
        client
            .rpc_sender()
            .flush(&mut client_connection, &mut transport, 250)
            .unwrap(),
        1
    );
    deliver(&mut transport, &mut server_connection);

    let mut received = ReceivedRpcs::new();
    let executed = server
        .rpc_receiver()
        .process(&mut server_connection, &mut received);

    assert_eq!(executed, 3);
    assert!(server_connection.is_connected());
    assert_eq!(server_connection.last_remote_time_ms(), 250);
    assert_eq!(server_connection.pending_incoming_rpc_bytes(), 0);
    assert_eq!(
        received.take::<Chat>(),
        vec![(LINK, Chat::new("hello")), (LINK, Chat::new("bye"))]
    );
    assert_eq!(
        received.take::<SpawnRequest>(),
        vec![(LINK, SpawnRequest { x: -4, y: 12 })]
    );
    assert!(received.is_empty());
}

static PINGS_BEFORE_HANDSHAKE: AtomicUsize = AtomicUsize::new(0);

fn count_ping_before_handshake(params: &mut RpcExecutorParameters) -> Result<(), SerdeErr> {
    Ping::de(params.reader)?;
    PINGS_BEFORE_HANDSHAKE.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

#[test]
fn rpc_before_handshake_disconnects_without_executing() {
    init_logger();
    let server = Protocol::builder()
        .add_rpc::<Chat>()
        .add_rpc::<SpawnRequest>()
        .add_rpc_with_executor::<Ping>(count_ping_before_handshake)
        .build()
        .resolve()
        .unwrap();
    let client = resolved();

    // a connection that never queued its protocol version
    let mut client_connection = Connection::new(LINK, client.connection_config());
    let mut server_connection = server.new_connection(LINK);
    let mut transport = LocalTransport::from_config(client.connection_config());

    let pings = RpcQueue::<Ping>::new();
    pings
        .schedule(&mut client_connection, client.rpcs(), &Ping { sequence: 1 })
        .unwrap();
    pings
        .schedule(&mut client_connection, client.rpcs(), &Ping { sequence: 2 })
        .unwrap();
    client
        .rpc_sender()
        .flush(&mut client_connection, &mut transport, 0)
        .unwrap();
    deliver(&mut transport, &mut server_connection);

    let mut received = ReceivedRpcs::new();
    let executed = server
        .rpc_receiver()
        .process(&mut server_connection, &mut received);

    assert_eq!(executed, 0);
    assert_eq!(PINGS_BEFORE_HANDSHAKE.load(Ordering::SeqCst), 0);
    assert!(server_connection.is_disconnected());
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidRpc)
    );
    let events = server_connection.take_disconnect_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].connection, LINK);
    assert_eq!(events[0].reason, DisconnectReason::InvalidRpc);
}

#[test]
fn out_of_range_index_disconnects() {
    init_logger();
    let server = resolved();
    let mut server_connection = server.new_connection(LINK);
    let registered = server.rpcs().len() as u16;

    let mut stream = handshake_message(server.version());
    let mut writer = StreamWriter::new();
    registered.ser(&mut writer);
    0u16.ser(&mut writer);
    stream.extend_from_slice(writer.as_bytes());
    server_connection
        .receive_rpc_packet(&rpc_packet(&stream))
        .unwrap();

    let mut received = ReceivedRpcs::new();
    assert_eq!(
        server
            .rpc_receiver()
            .process(&mut server_connection, &mut received),
        0
    );
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidRpc)
    );
    assert!(received.is_empty());
}

#[test]
fn undecodable_payload_disconnects() {
    init_logger();
    let server = resolved();
    let mut server_connection = server.new_connection(LINK);
    let chat_index = server.rpcs().index_of::<Chat>().unwrap();

    let mut stream = handshake_message(server.version());
    let mut writer = StreamWriter::new();
    chat_index.ser(&mut writer);
    1u16.ser(&mut writer);
    // announces a string but carries none of its bytes
    writer.write_bits(0xFF, 8);
    stream.extend_from_slice(writer.as_bytes());
    server_connection
        .receive_rpc_packet(&rpc_packet(&stream))
        .unwrap();

    let mut received = ReceivedRpcs::new();
    server
        .rpc_receiver()
        .process(&mut server_connection, &mut received);
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidRpc)
    );
    assert!(received.take::<Chat>().is_empty());
}

#[test]
fn payload_overrunning_the_stream_disconnects() {
    init_logger();
    let server = resolved();
    let mut server_connection = server.new_connection(LINK);

    let mut stream = handshake_message(server.version());
    let mut writer = StreamWriter::new();
    0u16.ser(&mut writer);
    200u16.ser(&mut writer);
    stream.extend_from_slice(writer.as_bytes());
    stream.extend_from_slice(&[0; 10]);
    server_connection
        .receive_rpc_packet(&rpc_packet(&stream))
        .unwrap();

    server
        .rpc_receiver()
        .process(&mut server_connection, &mut ReceivedRpcs::new());
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidRpc)
    );
}

#[test]
fn duplicate_handshake_disconnects() {
    init_logger();
    let server = resolved();
    let mut server_connection = server.new_connection(LINK);

    let mut stream = handshake_message(server.version());
    stream.extend_from_slice(&handshake_message(server.version()));
    server_connection
        .receive_rpc_packet(&rpc_packet(&stream))
        .unwrap();

    server
        .rpc_receiver()
        .process(&mut server_connection, &mut ReceivedRpcs::new());
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidRpc)
    );
}

#[test]
fn game_version_mismatch_disconnects() {
    init_logger();
    let server = resolved();
    let mut client_protocol = protocol();
    client_protocol.game_version(2);
    let client = client_protocol.resolve().unwrap();
    assert_ne!(server.version(), client.version());

    let mut server_connection = server.new_connection(LINK);
    let mut client_connection = client.new_connection(LINK);
    let mut transport = LocalTransport::from_config(client.connection_config());
    RpcQueue::<Ping>::new()
        .schedule(&mut client_connection, client.rpcs(), &Ping { sequence: 9 })
        .unwrap();
    client
        .rpc_sender()
        .flush(&mut client_connection, &mut transport, 0)
        .unwrap();
    deliver(&mut transport, &mut server_connection);

    let mut received = ReceivedRpcs::new();
    assert_eq!(
        server
            .rpc_receiver()
            .process(&mut server_connection, &mut received),
        0
    );
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::ProtocolVersionMismatch)
    );
    assert!(received.take::<Ping>().is_empty());
}

#[test]
fn different_rpc_sets_produce_different_versions() {
    let server = resolved();
    let client = Protocol::builder()
        .add_rpc::<Chat>()
        .build()
        .resolve()
        .unwrap();
    assert_ne!(
        server.version().rpc_collection_version,
        client.version().rpc_collection_version
    );
}

#[test]
fn lone_handshake_on_disconnected_connection_reports_mismatch() {
    init_logger();
    let server = resolved();
    let mut server_connection = server.new_connection(LINK);
    server_connection.disconnect(DisconnectReason::Closed);

    let mut remote = *server.version();
    remote.game_version += 1;
    server_connection
        .receive_rpc_packet(&rpc_packet(&handshake_message(&remote)))
        .unwrap();
    server
        .rpc_receiver()
        .process(&mut server_connection, &mut ReceivedRpcs::new());

    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::ProtocolVersionMismatch)
    );
}

#[test]
fn handshake_followed_by_rpcs_on_disconnected_connection_is_dropped() {
    init_logger();
    let server = resolved();
    let mut server_connection = server.new_connection(LINK);
    server_connection.disconnect(DisconnectReason::Closed);

    let mut remote = *server.version();
    remote.game_version += 1;
    let mut stream = handshake_message(&remote);
    let mut writer = StreamWriter::new();
    server.rpcs().index_of::<Ping>().unwrap().ser(&mut writer);
    4u16.ser(&mut writer);
    7u32.ser(&mut writer);
    stream.extend_from_slice(writer.as_bytes());
    server_connection
        .receive_rpc_packet(&rpc_packet(&stream))
        .unwrap();

    let mut received = ReceivedRpcs::new();
    server
        .rpc_receiver()
        .process(&mut server_connection, &mut received);

    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::Closed)
    );
    assert!(received.is_empty());
    assert_eq!(server_connection.pending_incoming_rpc_bytes(), 0);
}

#[test]
fn dynamic_assembly_list_addresses_rpcs_by_hash() {
    init_logger();
    let server = Protocol::builder()
        .enable_dynamic_assembly_list()
        .add_rpc::<Ping>()
        .add_rpc::<Chat>()
        .build()
        .resolve()
        .unwrap();
    let client = Protocol::builder()
        .enable_dynamic_assembly_list()
        .add_rpc::<Chat>()
        .add_rpc::<SpawnRequest>()
        .build()
        .resolve()
        .unwrap();
    // collection hashes are left out of the handshake
    assert_eq!(server.version(), client.version());
    assert_eq!(server.version().rpc_collection_version, 0);

    let mut server_connection = server.new_connection(LINK);
    let mut client_connection = client.new_connection(LINK);
    let mut transport = LocalTransport::from_config(client.connection_config());

    RpcQueue::<Chat>::new()
        .schedule(&mut client_connection, client.rpcs(), &Chat::new("by hash"))
        .unwrap();
    client
        .rpc_sender()
        .flush(&mut client_connection, &mut transport, 0)
        .unwrap();
    deliver(&mut transport, &mut server_connection);

    let mut received = ReceivedRpcs::new();
    assert_eq!(
        server
            .rpc_receiver()
            .process(&mut server_connection, &mut received),
        1
    );
    assert_eq!(received.take::<Chat>(), vec![(LINK, Chat::new("by hash"))]);

    // the server never registered SpawnRequest
    RpcQueue::<SpawnRequest>::new()
        .schedule(&mut client_connection, client.rpcs(), &SpawnRequest { x: 1, y: 1 })
        .unwrap();
    client
        .rpc_sender()
        .flush(&mut client_connection, &mut transport, 0)
        .unwrap();
    deliver(&mut transport, &mut server_connection);
    server
        .rpc_receiver()
        .process(&mut server_connection, &mut received);
    assert_eq!(
        server_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidRpc)
    );
}
