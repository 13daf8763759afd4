use std::sync::atomic::AtomicBool;

use netcode_shared::{
    read_u32, send_snapshot_ack, BitWriter, ChunkData, ConnectionConfig, ConnectionGhostState,
    ConnectionId, DisconnectReason, GhostChunk, InterpolationTarget, NetworkTick, Pipeline,
    ResolvedProtocol, SnapshotError, SnapshotJob, SnapshotWriteOutcome, SNAPSHOT_HEADER_BITS,
    SNAPSHOT_MASK_OFFSET,
};
use netcode_test::{
    crate_chunk, init_logger, player_chunk, protocol, Health, InventoryItem, LocalTransport,
    PlayerState, Translation, Velocity, CRATE, PLAYER,
};

const CLIENT: ConnectionId = ConnectionId(3);

fn tick(value: u32) -> NetworkTick {
    NetworkTick::new(value)
}

fn write(
    protocol: &ResolvedProtocol,
    at: u32,
    ghost_state: &mut ConnectionGhostState,
    chunks: &[&dyn GhostChunk],
) -> (Vec<u8>, SnapshotWriteOutcome) {
    let mut writer = BitWriter::with_capacity(protocol.connection_config().snapshot_packet_capacity);
    let outcome = protocol
        .snapshot_serializer()
        .write_snapshot(tick(at), ghost_state, chunks, &mut writer, None)
        .unwrap();
    (writer.into_bytes(), outcome)
}

/// Round trip an ack through the unreliable pipeline
fn acknowledge(ghost_state: &mut ConnectionGhostState, at: u32) {
    let mut transport = LocalTransport::new(64, 64);
    send_snapshot_ack(&mut transport, ghost_state.connection(), tick(at)).unwrap();
    let packets = transport.take_packets(Pipeline::Unreliable, ghost_state.connection());
    assert_eq!(packets.len(), 1);
    assert_eq!(ghost_state.receive_ack(&packets[0]), Ok(tick(at)));
}

fn player(x: f32, health: u32, inventory: Vec<InventoryItem>) -> PlayerState {
    PlayerState {
        translation: Translation::new(x, -2.25),
        health: Health::new(health, 100, 0),
        velocity: Velocity {
            dx: 3.5,
            dy: -0.125,
            grounded: true,
            jumps: -2,
        },
        inventory,
    }
}

fn empty_players(ghost_ids: Vec<u32>, owner: Option<ConnectionId>) -> ChunkData {
    let states = vec![PlayerState::default(); ghost_ids.len()];
    player_chunk(ghost_ids, owner, states)
}

#[test]
fn players_replicate_and_delta_against_acked_ticks() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    let mut client_store = protocol.new_snapshot_store();
    let mut client_connection = protocol.new_connection(CLIENT);
    let receiver = protocol.snapshot_receiver();
    let applier = protocol.snapshot_applier();

    let server_chunk = player_chunk(
        vec![10, 11],
        Some(CLIENT),
        vec![
            player(1.5, 100, vec![InventoryItem::new(4, 1)]),
            player(-8.0, 75, Vec::new()),
        ],
    );
    let (first, outcome) = write(&protocol, 1, &mut ghost_state, &[&server_chunk]);
    assert!(outcome.complete);
    assert_eq!(outcome.spans.len(), 2);

    let received = receiver
        .receive(&mut client_connection, &mut client_store, &first)
        .unwrap();
    assert_eq!(received.tick, tick(1));
    assert_eq!(received.ghosts, vec![10, 11]);

    let mut client_chunk = empty_players(vec![10, 11], Some(CLIENT));
    assert_eq!(
        applier
            .apply(&client_store, InterpolationTarget::at(tick(1)), CLIENT, &mut client_chunk)
            .unwrap(),
        2
    );
    assert_eq!(
        client_chunk.components::<Translation>().unwrap(),
        &vec![Translation::new(1.5, -2.25), Translation::new(-8.0, -2.25)]
    );
    assert_eq!(
        client_chunk.components::<Health>().unwrap(),
        &vec![Health::new(100, 100, 0), Health::new(75, 100, 0)]
    );
    assert_eq!(
        client_chunk.components::<Velocity>().unwrap()[0],
        player(0.0, 0, Vec::new()).velocity
    );
    assert_eq!(
        client_chunk.buffers::<InventoryItem>().unwrap(),
        &vec![vec![InventoryItem::new(4, 1)], Vec::new()]
    );

    // only health changes, against the acknowledged tick 1
    acknowledge(&mut ghost_state, 1);
    assert_eq!(ghost_state.last_acked_tick(), Some(tick(1)));
    let server_chunk = player_chunk(
        vec![10, 11],
        Some(CLIENT),
        vec![
            player(1.5, 90, vec![InventoryItem::new(4, 1)]),
            player(-8.0, 75, Vec::new()),
        ],
    );
    let (second, outcome) = write(&protocol, 2, &mut ghost_state, &[&server_chunk]);
    assert!(outcome.complete);
    assert!(second.len() < first.len());

    receiver
        .receive(&mut client_connection, &mut client_store, &second)
        .unwrap();
    applier
        .apply(&client_store, InterpolationTarget::at(tick(2)), CLIENT, &mut client_chunk)
        .unwrap();
    assert_eq!(
        client_chunk.components::<Health>().unwrap(),
        &vec![Health::new(90, 100, 0), Health::new(75, 100, 0)]
    );
    assert_eq!(
        client_chunk.components::<Translation>().unwrap()[0],
        Translation::new(1.5, -2.25)
    );
    assert!(client_connection.disconnect_reason().is_none());
}

#[test]
fn owner_only_components_skip_other_connections() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let owner = ConnectionId(99);
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    let mut client_store = protocol.new_snapshot_store();

    let server_chunk = player_chunk(vec![1], Some(owner), vec![player(2.0, 50, Vec::new())]);
    let (packet, _) = write(&protocol, 1, &mut ghost_state, &[&server_chunk]);
    protocol
        .snapshot_deserializer()
        .read_packet(&packet, &mut client_store)
        .unwrap();

    let sentinel = Velocity {
        dx: 7.0,
        dy: 7.0,
        grounded: false,
        jumps: 7,
    };
    let mut client_chunk = empty_players(vec![1], Some(owner));
    client_chunk.components_mut::<Velocity>().unwrap()[0] = sentinel.clone();
    protocol
        .snapshot_applier()
        .apply(&client_store, InterpolationTarget::at(tick(1)), CLIENT, &mut client_chunk)
        .unwrap();

    assert_eq!(client_chunk.components::<Velocity>().unwrap()[0], sentinel);
    assert_eq!(
        client_chunk.components::<Health>().unwrap()[0],
        Health::new(50, 100, 0)
    );
}

#[test]
fn snapshot_layouts_have_increasing_offsets() {
    let protocol = protocol().resolve().unwrap();
    let ghosts = protocol.ghosts();
    assert_eq!(ghosts.ghost_type_count(), 3);
    assert_eq!(ghosts.ghost_type_index("Crate"), Some(CRATE));

    for index in 0..ghosts.ghost_type_count() {
        let layout = ghosts.ghost_type(index).unwrap();
        let mut offset = SNAPSHOT_MASK_OFFSET + layout.mask_size;
        let mut mask_bit = 0;
        for slot in &layout.slots {
            assert_eq!(slot.snapshot_offset, offset);
            assert_eq!(slot.mask_start_bit, mask_bit);
            offset += slot.snapshot_size;
            mask_bit += slot.mask_bits;
        }
        assert_eq!(mask_bit, layout.mask_bits);
        assert!(layout.stride >= offset);
        assert_eq!(layout.stride % 4, 0);
    }

    // translation 2, health 3, frozen 0, velocity 4, inventory 2
    let player = ghosts.ghost_type(PLAYER).unwrap();
    assert_eq!(player.mask_bits, 11);
    assert_eq!(player.stride, 52);
    assert_eq!(player.slots[2].snapshot_size, 0);
}

#[test]
fn missing_baseline_disconnects_the_receiver() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    let crates = crate_chunk(vec![4], vec![Translation::new(1.0, 1.0)]);

    let (first, _) = write(&protocol, 1, &mut ghost_state, &[&crates]);
    acknowledge(&mut ghost_state, 1);
    let (_lost, _) = write(&protocol, 2, &mut ghost_state, &[&crates]);
    // the server believes tick 2 arrived
    acknowledge(&mut ghost_state, 2);
    let (third, _) = write(&protocol, 3, &mut ghost_state, &[&crates]);

    let mut client_store = protocol.new_snapshot_store();
    protocol
        .snapshot_deserializer()
        .read_packet(&first, &mut client_store)
        .unwrap();
    assert_eq!(
        protocol
            .snapshot_deserializer()
            .read_packet(&third, &mut client_store),
        Err(SnapshotError::MissingBaseline {
            ghost_id: 4,
            tick: 2
        })
    );

    let mut client_connection = protocol.new_connection(CLIENT);
    let mut empty_store = protocol.new_snapshot_store();
    assert!(protocol
        .snapshot_receiver()
        .receive(&mut client_connection, &mut empty_store, &third)
        .is_none());
    assert_eq!(
        client_connection.disconnect_reason(),
        Some(DisconnectReason::InvalidSnapshot)
    );
    // later snapshots are ignored
    assert!(protocol
        .snapshot_receiver()
        .receive(&mut client_connection, &mut empty_store, &first)
        .is_none());
    assert!(empty_store.is_empty());
}

#[test]
fn full_packet_keeps_the_rest_for_the_next_tick() {
    init_logger();
    let mut small = protocol();
    small.connection_config(ConnectionConfig {
        snapshot_packet_capacity: 16,
        ..ConnectionConfig::default()
    });
    let protocol = small.resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);

    // at least 6 bits each, more than 128 bits in total
    let ghost_ids: Vec<u32> = (100..120).collect();
    let crates = crate_chunk(ghost_ids.clone(), vec![Translation::default(); 20]);
    let (packet, outcome) = write(&protocol, 1, &mut ghost_state, &[&crates]);

    assert!(!outcome.complete);
    assert!(!outcome.spans.is_empty());
    assert!(outcome.spans.len() < ghost_ids.len());
    assert!(packet.len() <= 16);
    assert_eq!(outcome.spans[0].start_bit, SNAPSHOT_HEADER_BITS);
    for pair in outcome.spans.windows(2) {
        assert_eq!(pair[0].start_bit + pair[0].bit_length, pair[1].start_bit);
    }
    let written: Vec<u32> = outcome.spans.iter().map(|span| span.ghost_id).collect();
    assert_eq!(written, ghost_ids[..written.len()].to_vec());
    assert_eq!(ghost_state.store().len(), written.len());
    assert!(!ghost_state.store().contains(ghost_ids[written.len()]));

    let mut client_store = protocol.new_snapshot_store();
    let received = protocol
        .snapshot_deserializer()
        .read_packet(&packet, &mut client_store)
        .unwrap();
    assert_eq!(received.ghosts, written);
}

#[test]
fn connections_are_serialized_in_parallel() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let owner = ConnectionId(1);
    let mut states: Vec<ConnectionGhostState> = (1..=5)
        .map(|id| protocol.new_ghost_state(ConnectionId(id)))
        .collect();
    let players = player_chunk(vec![1, 2], Some(owner), vec![
        player(0.5, 10, Vec::new()),
        player(0.25, 20, vec![InventoryItem::new(1, 1)]),
    ]);
    let crates = crate_chunk(vec![3], vec![Translation::new(4.0, 4.0)]);
    let chunks: [&dyn GhostChunk; 2] = [&players, &crates];

    let serializer = protocol.snapshot_serializer();
    let jobs = states.iter_mut().map(SnapshotJob::new).collect();
    let packets: Vec<_> = serializer
        .serialize_connections(tick(1), &chunks, jobs)
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(packets.len(), 5);
    for (index, packet) in packets.iter().enumerate() {
        assert_eq!(packet.connection, ConnectionId(index as u32 + 1));
        assert_eq!(packet.tick, tick(1));
        assert_eq!(packet.outcome.spans.len(), 3);
    }
    // velocity goes to the owner only
    assert!(packets[0].bytes.len() > packets[1].bytes.len());
    assert_eq!(packets[1].bytes, packets[4].bytes);

    let mut transport = LocalTransport::from_config(protocol.connection_config());
    let mut client_store = protocol.new_snapshot_store();
    let sent = serializer.send_packet(&mut transport, &packets[2]).unwrap();
    assert_eq!(sent, packets[2].bytes.len());
    let delivered = transport.take_packets(Pipeline::Unreliable, ConnectionId(3));
    let received = protocol
        .snapshot_deserializer()
        .read_packet(&delivered[0], &mut client_store)
        .unwrap();
    assert_eq!(received.ghosts, vec![1, 2, 3]);
    for state in &states {
        assert_eq!(state.store().len(), 3);
    }
}

#[test]
fn cancelled_connection_abandons_its_snapshot() {
    let protocol = protocol().resolve().unwrap();
    let mut live = protocol.new_ghost_state(ConnectionId(1));
    let mut gone = protocol.new_ghost_state(ConnectionId(2));
    let crates = crate_chunk(vec![3], vec![Translation::new(4.0, 4.0)]);
    let chunks: [&dyn GhostChunk; 1] = [&crates];
    let cancelled = AtomicBool::new(true);

    let results = protocol.snapshot_serializer().serialize_connections(
        tick(1),
        &chunks,
        vec![
            SnapshotJob::new(&mut live),
            SnapshotJob::new(&mut gone).with_cancel_flag(&cancelled),
        ],
    );

    assert!(results[0].is_ok());
    assert_eq!(
        results[1].as_ref().err(),
        Some(&SnapshotError::Cancelled {
            connection: ConnectionId(2)
        })
    );
    assert!(gone.store().is_empty());
    assert_eq!(live.store().len(), 1);
}

#[test]
fn predicted_baselines_shrink_steady_motion() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    let mut client_store = protocol.new_snapshot_store();
    let mut client_chunk = crate_chunk(vec![8], vec![Translation::default()]);

    let mut bit_lengths = Vec::new();
    for at in 1..=5u32 {
        let crates = crate_chunk(vec![8], vec![Translation::new(at as f32, 3.0)]);
        let (packet, outcome) = write(&protocol, at, &mut ghost_state, &[&crates]);
        bit_lengths.push(outcome.spans[0].bit_length);

        protocol
            .snapshot_deserializer()
            .read_packet(&packet, &mut client_store)
            .unwrap();
        protocol
            .snapshot_applier()
            .apply(&client_store, InterpolationTarget::at(tick(at)), CLIENT, &mut client_chunk)
            .unwrap();
        assert_eq!(
            client_chunk.components::<Translation>().unwrap()[0],
            Translation::new(at as f32, 3.0)
        );
        acknowledge(&mut ghost_state, at);
    }

    // ticks 4 and 5 have three baselines and are predicted exactly
    assert!(bit_lengths[3] < bit_lengths[1]);
    assert!(bit_lengths[4] < bit_lengths[1]);
    assert_eq!(bit_lengths[3], bit_lengths[4]);
}

#[test]
fn applier_interpolates_between_stored_ticks() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    let mut client_store = protocol.new_snapshot_store();
    let deserializer = protocol.snapshot_deserializer();

    let before = player_chunk(vec![6], Some(CLIENT), vec![player(0.0, 100, Vec::new())]);
    let (packet, _) = write(&protocol, 1, &mut ghost_state, &[&before]);
    deserializer.read_packet(&packet, &mut client_store).unwrap();
    acknowledge(&mut ghost_state, 1);

    let after = player_chunk(vec![6], Some(CLIENT), vec![player(10.0, 50, Vec::new())]);
    let (packet, _) = write(&protocol, 3, &mut ghost_state, &[&after]);
    deserializer.read_packet(&packet, &mut client_store).unwrap();

    let applier = protocol.snapshot_applier();
    let mut client_chunk = empty_players(vec![6], Some(CLIENT));
    for target in [
        InterpolationTarget::at(tick(2)),
        InterpolationTarget::new(tick(1), 1.0),
    ] {
        applier
            .apply(&client_store, target, CLIENT, &mut client_chunk)
            .unwrap();
        let translation = &client_chunk.components::<Translation>().unwrap()[0];
        assert!((translation.x - 5.0).abs() < 1e-4);
        assert_eq!(translation.y, -2.25);
        // integers are not interpolated
        assert_eq!(client_chunk.components::<Health>().unwrap()[0].current, 100);
    }

    applier
        .apply(&client_store, InterpolationTarget::at(tick(3)), CLIENT, &mut client_chunk)
        .unwrap();
    assert_eq!(client_chunk.components::<Translation>().unwrap()[0].x, 10.0);
    assert_eq!(client_chunk.components::<Health>().unwrap()[0].current, 50);

    // nothing stored this early
    let mut untouched = empty_players(vec![6], Some(CLIENT));
    assert_eq!(
        applier
            .apply(&client_store, InterpolationTarget::at(tick(0)), CLIENT, &mut untouched)
            .unwrap(),
        0
    );
}

#[test]
fn stored_snapshot_records_the_change_mask() {
    let protocol = protocol().resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    let crates = crate_chunk(vec![2], vec![Translation::new(1.0, 0.0)]);
    write(&protocol, 1, &mut ghost_state, &[&crates]);

    let entry = ghost_state
        .store()
        .history(2)
        .and_then(|history| history.get(tick(1)))
        .unwrap();
    assert!(!entry.acked);
    assert_eq!(read_u32(&entry.record, 0), 1);
    // x changed against the zero baseline, y did not
    assert_eq!(read_u32(&entry.record, SNAPSHOT_MASK_OFFSET), 0b01);
}
