use netcode_shared::{
    BitReader, BitWrite, BitWriter, ChangeMask, ConnectionConfig, ConnectionGhostState,
    ConnectionId, GhostChunk, GhostComponent, GhostFieldSerializer, InterpolationTarget,
    MessageType, NetworkTick, ResolvedProtocol, Serde, SnapshotError, SnapshotSlotMut,
    SnapshotWriteOutcome, StreamWriter, TypedComponentSerializer, BUFFER_CONTENTS_CHANGED,
    BUFFER_FULLY_CHANGED, BUFFER_MASK_BITS, SNAPSHOT_HEADER_BITS, SNAPSHOT_MASK_OFFSET,
};
use netcode_test::{init_logger, inventory_chunk, protocol, Health, InventoryItem, INVENTORY};

const CLIENT: ConnectionId = ConnectionId(2);
const GHOST: u32 = 5;

fn tick(value: u32) -> NetworkTick {
    NetworkTick::new(value)
}

fn items(values: &[(u32, u32)]) -> Vec<InventoryItem> {
    values
        .iter()
        .map(|(item_id, count)| InventoryItem::new(*item_id, *count))
        .collect()
}

fn write(
    protocol: &ResolvedProtocol,
    at: u32,
    ghost_state: &mut ConnectionGhostState,
    inventory: Vec<InventoryItem>,
) -> (Vec<u8>, SnapshotWriteOutcome) {
    let chunk = inventory_chunk(vec![GHOST], vec![inventory]);
    let chunks: [&dyn GhostChunk; 1] = [&chunk];
    let mut writer = BitWriter::with_capacity(protocol.connection_config().snapshot_packet_capacity);
    let outcome = protocol
        .snapshot_serializer()
        .write_snapshot(tick(at), ghost_state, &chunks, &mut writer, None)
        .unwrap();
    (writer.into_bytes(), outcome)
}

/// Packet header and entity header of `GHOST` delta compressed against `distances`
fn expected_header(protocol: &ResolvedProtocol, at: u32, distances: [u32; 3]) -> StreamWriter {
    let model = protocol.compression_model();
    let mut expected = StreamWriter::new();
    MessageType::Snapshot.ser(&mut expected);
    at.ser(&mut expected);
    expected.write_bit(true);
    expected.write_packed_uint(GHOST, model);
    for distance in distances {
        expected.write_packed_uint(distance, model);
    }
    expected
}

fn stored_buffer_code(ghost_state: &ConnectionGhostState, at: u32) -> u32 {
    let entry = ghost_state
        .store()
        .history(GHOST)
        .and_then(|history| history.get(tick(at)))
        .unwrap();
    let mask = ChangeMask::from_bytes(BUFFER_MASK_BITS, &entry.record[SNAPSHOT_MASK_OFFSET..]);
    mask.bits(0, BUFFER_MASK_BITS)
}

fn client_inventory<P: AsRef<[u8]>>(protocol: &ResolvedProtocol, packets: &[P]) -> Vec<InventoryItem> {
    let mut store = protocol.new_snapshot_store();
    let deserializer = protocol.snapshot_deserializer();
    let mut last = tick(0);
    for packet in packets {
        last = deserializer
            .read_packet(packet.as_ref(), &mut store)
            .unwrap()
            .tick;
    }
    let mut chunk = inventory_chunk(vec![GHOST], vec![Vec::new()]);
    protocol
        .snapshot_applier()
        .apply(&store, InterpolationTarget::at(last), CLIENT, &mut chunk)
        .unwrap();
    chunk.buffers::<InventoryItem>().unwrap()[0].clone()
}

#[test]
fn buffer_length_and_contents_changes() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let model = protocol.compression_model();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);
    assert_eq!(protocol.ghosts().ghost_type(INVENTORY).unwrap().mask_bits, 2);

    let (first, _) = write(
        &protocol,
        1,
        &mut ghost_state,
        items(&[(1, 10), (2, 20), (3, 30), (4, 40)]),
    );
    assert_eq!(stored_buffer_code(&ghost_state, 1), BUFFER_FULLY_CHANGED);
    ghost_state.acknowledge(tick(1));

    // shrinking to two elements sends the new length and every element in
    // full, delta encoded against the old elements at the same index
    let (second, outcome) = write(&protocol, 2, &mut ghost_state, items(&[(1, 10), (7, 20)]));
    let mut expected = expected_header(&protocol, 2, [1, 0, 0]);
    expected.write_bits(BUFFER_FULLY_CHANGED, BUFFER_MASK_BITS);
    expected.write_packed_uint(2, model);
    expected.write_packed_uint_delta(1, 1, model);
    expected.write_packed_uint_delta(10, 10, model);
    expected.write_packed_uint_delta(7, 2, model);
    expected.write_packed_uint_delta(20, 20, model);
    let entity_bits = expected.bits_written() - SNAPSHOT_HEADER_BITS;
    expected.write_bit(false);

    assert_eq!(second, expected.as_bytes());
    assert_eq!(outcome.spans[0].start_bit, SNAPSHOT_HEADER_BITS);
    assert_eq!(outcome.spans[0].bit_length, entity_bits);
    assert_eq!(stored_buffer_code(&ghost_state, 2), BUFFER_FULLY_CHANGED);
    ghost_state.acknowledge(tick(2));

    // same length, one field of the second element
    let (third, _) = write(&protocol, 3, &mut ghost_state, items(&[(1, 10), (7, 21)]));
    let mut expected = expected_header(&protocol, 3, [1, 2, 0]);
    expected.write_bits(BUFFER_CONTENTS_CHANGED, BUFFER_MASK_BITS);
    expected.write_bits(0b00, 2);
    expected.write_bits(0b10, 2);
    expected.write_packed_uint_delta(21, 20, model);
    expected.write_bit(false);

    assert_eq!(third, expected.as_bytes());
    assert_eq!(stored_buffer_code(&ghost_state, 3), BUFFER_CONTENTS_CHANGED);
    ghost_state.acknowledge(tick(3));

    // unchanged buffers write a clear mask and nothing else
    let (fourth, _) = write(&protocol, 4, &mut ghost_state, items(&[(1, 10), (7, 21)]));
    let mut expected = expected_header(&protocol, 4, [1, 2, 3]);
    expected.write_bits(0, BUFFER_MASK_BITS);
    expected.write_bit(false);

    assert_eq!(fourth, expected.as_bytes());
    assert_eq!(stored_buffer_code(&ghost_state, 4), 0);

    assert_eq!(
        client_inventory(&protocol, &[&first]),
        items(&[(1, 10), (2, 20), (3, 30), (4, 40)])
    );
    assert_eq!(
        client_inventory(&protocol, &[&first, &second]),
        items(&[(1, 10), (7, 20)])
    );
    assert_eq!(
        client_inventory(&protocol, &[&first, &second, &third, &fourth]),
        items(&[(1, 10), (7, 21)])
    );
}

#[test]
fn growing_buffer_deltas_new_elements_against_zero() {
    init_logger();
    let protocol = protocol().resolve().unwrap();
    let model = protocol.compression_model();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);

    let (first, _) = write(&protocol, 1, &mut ghost_state, items(&[(3, 1)]));
    ghost_state.acknowledge(tick(1));
    let (second, _) = write(&protocol, 2, &mut ghost_state, items(&[(3, 1), (9, 2)]));

    let mut expected = expected_header(&protocol, 2, [1, 0, 0]);
    expected.write_bits(BUFFER_FULLY_CHANGED, BUFFER_MASK_BITS);
    expected.write_packed_uint(2, model);
    expected.write_packed_uint_delta(3, 3, model);
    expected.write_packed_uint_delta(1, 1, model);
    expected.write_packed_uint_delta(9, 0, model);
    expected.write_packed_uint_delta(2, 0, model);
    expected.write_bit(false);
    assert_eq!(second, expected.as_bytes());

    assert_eq!(
        client_inventory(&protocol, &[&first, &second]),
        items(&[(3, 1), (9, 2)])
    );
}

#[test]
fn emptied_buffer_is_sent_as_zero_length() {
    let protocol = protocol().resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);

    let (first, _) = write(&protocol, 1, &mut ghost_state, items(&[(3, 1), (4, 1)]));
    ghost_state.acknowledge(tick(1));
    let (second, _) = write(&protocol, 2, &mut ghost_state, Vec::new());

    assert_eq!(stored_buffer_code(&ghost_state, 2), BUFFER_FULLY_CHANGED);
    assert!(client_inventory(&protocol, &[&first, &second]).is_empty());
}

#[test]
fn buffer_larger_than_the_dynamic_region_is_rejected() {
    let mut small = protocol();
    small.connection_config(ConnectionConfig {
        dynamic_data_capacity: 16,
        ..ConnectionConfig::default()
    });
    let protocol = small.resolve().unwrap();
    let mut ghost_state = protocol.new_ghost_state(CLIENT);

    let chunk = inventory_chunk(vec![GHOST], vec![items(&[(1, 1), (2, 2), (3, 3)])]);
    let chunks: [&dyn GhostChunk; 1] = [&chunk];
    let mut writer = BitWriter::with_capacity(256);
    let result =
        protocol
            .snapshot_serializer()
            .write_snapshot(tick(1), &mut ghost_state, &chunks, &mut writer, None);

    // one mask word plus three 8 byte elements
    assert_eq!(
        result,
        Err(SnapshotError::DynamicDataOverrun {
            required: 28,
            capacity: 16
        })
    );
    assert!(ghost_state.store().is_empty());

    // a single element fits
    let (_, outcome) = write(&protocol, 1, &mut ghost_state, items(&[(1, 1)]));
    assert!(outcome.complete);
}

fn health_bytes(health: &Health) -> Vec<u8> {
    let mut bytes = vec![0u8; Health::FIELDS.len() * 4];
    health.copy_to_snapshot(&mut SnapshotSlotMut::new(&mut bytes, Health::FIELDS));
    bytes
}

#[test]
fn single_field_change_writes_one_delta() {
    let serializer = TypedComponentSerializer::<Health>::new();
    let model = protocol().resolve().unwrap().compression_model().clone();
    let baseline = health_bytes(&Health::new(100, 100, 0));
    let current = health_bytes(&Health::new(100, 100, 25));

    let mut mask = ChangeMask::new(serializer.change_mask_bits());
    serializer.calculate_change_mask(&current, &baseline, &mut mask, 0);
    assert_eq!(mask.bits(0, 3), 0b100);

    let mut writer = StreamWriter::new();
    assert!(serializer.serialize(&current, &baseline, &mask, 0, &mut writer, &model));
    let mut expected = StreamWriter::new();
    expected.write_packed_uint_delta(25, 0, &model);
    assert_eq!(writer.bits_written(), expected.bits_written());
    assert_eq!(writer.as_bytes(), expected.as_bytes());

    let bytes = writer.to_bytes();
    let mut decoded = baseline.clone();
    serializer
        .deserialize(
            &mut decoded,
            &baseline,
            &mask,
            0,
            &mut BitReader::new(&bytes),
            &model,
        )
        .unwrap();
    assert_eq!(decoded, current);

    // writing the same value again is a no-op
    let mut mask = ChangeMask::new(serializer.change_mask_bits());
    serializer.calculate_change_mask(&current, &current, &mut mask, 0);
    assert!(mask.is_clear());
    let mut writer = StreamWriter::new();
    assert!(serializer.serialize(&current, &current, &mask, 0, &mut writer, &model));
    assert_eq!(writer.bits_written(), 0);
}
