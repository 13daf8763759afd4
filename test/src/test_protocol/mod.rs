//! Sample protocol for integration testing
//! Ghost components covering every field kind and send type, a buffer
//! element, and a few RPCs

use netcode_shared::{
    BitReader, BitWrite, ChunkData, ConnectionId, ConstBitLength, GhostComponent, GhostField,
    GhostId, GhostSendType, GhostType, GhostTypeIndex, Protocol, Rpc, Serde, SerdeErr,
    SnapshotInterpolation, SnapshotSlotMut,
};

/// Ghost type indices, in registration order
pub const PLAYER: GhostTypeIndex = 0;
pub const CRATE: GhostTypeIndex = 1;
pub const INVENTORY: GhostTypeIndex = 2;

// Components

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Translation {
    pub x: f32,
    pub y: f32,
}

impl Translation {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl GhostComponent for Translation {
    const NAME: &'static str = "Translation";
    const FIELDS: &'static [GhostField] = &[
        GhostField::quantized("x", 100),
        GhostField::quantized("y", 100),
    ];

    fn copy_to_snapshot(&self, snapshot: &mut SnapshotSlotMut) {
        snapshot.set_float(0, self.x);
        snapshot.set_float(1, self.y);
    }

    fn copy_from_snapshot(&mut self, snapshot: &SnapshotInterpolation) {
        self.x = snapshot.float(0);
        self.y = snapshot.float(1);
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Health {
    pub current: u32,
    pub max: u32,
    pub shield: u32,
}

impl Health {
    pub fn new(current: u32, max: u32, shield: u32) -> Self {
        Self {
            current,
            max,
            shield,
        }
    }
}

impl GhostComponent for Health {
    const NAME: &'static str = "Health";
    const FIELDS: &'static [GhostField] = &[
        GhostField::uint("current"),
        GhostField::uint("max"),
        GhostField::uint("shield"),
    ];

    fn copy_to_snapshot(&self, snapshot: &mut SnapshotSlotMut) {
        snapshot.set_uint(0, self.current);
        snapshot.set_uint(1, self.max);
        snapshot.set_uint(2, self.shield);
    }

    fn copy_from_snapshot(&mut self, snapshot: &SnapshotInterpolation) {
        self.current = snapshot.uint(0);
        self.max = snapshot.uint(1);
        self.shield = snapshot.uint(2);
    }
}

/// Marker without fields
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Frozen;

impl GhostComponent for Frozen {
    const NAME: &'static str = "Frozen";
    const FIELDS: &'static [GhostField] = &[];

    fn copy_to_snapshot(&self, _snapshot: &mut SnapshotSlotMut) {}

    fn copy_from_snapshot(&mut self, _snapshot: &SnapshotInterpolation) {}
}

/// Only replicated to the connection owning the player
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Velocity {
    pub dx: f32,
    pub dy: f32,
    pub grounded: bool,
    pub jumps: i32,
}

impl GhostComponent for Velocity {
    const NAME: &'static str = "Velocity";
    const FIELDS: &'static [GhostField] = &[
        GhostField::float("dx"),
        GhostField::float("dy"),
        GhostField::boolean("grounded"),
        GhostField::int("jumps"),
    ];
    const SEND_TYPE: GhostSendType = GhostSendType::OnlyOwner;

    fn copy_to_snapshot(&self, snapshot: &mut SnapshotSlotMut) {
        snapshot.set_float(0, self.dx);
        snapshot.set_float(1, self.dy);
        snapshot.set_bool(2, self.grounded);
        snapshot.set_int(3, self.jumps);
    }

    fn copy_from_snapshot(&mut self, snapshot: &SnapshotInterpolation) {
        self.dx = snapshot.float(0);
        self.dy = snapshot.float(1);
        self.grounded = snapshot.boolean(2);
        self.jumps = snapshot.int(3);
    }
}

/// Element of the replicated inventory buffer
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventoryItem {
    pub item_id: u32,
    pub count: u32,
}

impl InventoryItem {
    pub fn new(item_id: u32, count: u32) -> Self {
        Self { item_id, count }
    }
}

impl GhostComponent for InventoryItem {
    const NAME: &'static str = "InventoryItem";
    const FIELDS: &'static [GhostField] =
        &[GhostField::uint("item_id"), GhostField::uint("count")];

    fn copy_to_snapshot(&self, snapshot: &mut SnapshotSlotMut) {
        snapshot.set_uint(0, self.item_id);
        snapshot.set_uint(1, self.count);
    }

    fn copy_from_snapshot(&mut self, snapshot: &SnapshotInterpolation) {
        self.item_id = snapshot.uint(0);
        self.count = snapshot.uint(1);
    }
}

// RPCs

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chat {
    pub text: String,
}

impl Chat {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

impl Serde for Chat {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.text.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            text: String::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        self.text.bit_length()
    }
}

impl Rpc for Chat {
    const NAME: &'static str = "Chat";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRequest {
    pub x: i32,
    pub y: i32,
}

impl Serde for SpawnRequest {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.x.ser(writer);
        self.y.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            x: i32::de(reader)?,
            y: i32::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        <i32 as ConstBitLength>::const_bit_length() * 2
    }
}

impl Rpc for SpawnRequest {
    const NAME: &'static str = "SpawnRequest";
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ping {
    pub sequence: u32,
}

impl Serde for Ping {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.sequence.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(Self {
            sequence: u32::de(reader)?,
        })
    }

    fn bit_length(&self) -> u32 {
        <u32 as ConstBitLength>::const_bit_length()
    }
}

impl Rpc for Ping {
    const NAME: &'static str = "Ping";
}

// Protocol

pub fn protocol() -> Protocol {
    Protocol::builder()
        .add_rpc::<Chat>()
        .add_rpc::<SpawnRequest>()
        .add_rpc::<Ping>()
        .add_ghost_type(
            GhostType::new("Player")
                .component::<Translation>()
                .component::<Health>()
                .component::<Frozen>()
                .component::<Velocity>()
                .buffer::<InventoryItem>(),
        )
        .add_ghost_type(GhostType::new("Crate").component::<Translation>())
        .add_ghost_type(GhostType::new("Inventory").buffer::<InventoryItem>())
        .build()
}

// Chunks

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerState {
    pub translation: Translation,
    pub health: Health,
    pub velocity: Velocity,
    pub inventory: Vec<InventoryItem>,
}

/// A Player chunk with one entity per state
pub fn player_chunk(
    ghost_ids: Vec<GhostId>,
    owner: Option<ConnectionId>,
    states: Vec<PlayerState>,
) -> ChunkData {
    let mut translations = Vec::new();
    let mut healths = Vec::new();
    let mut velocities = Vec::new();
    let mut inventories = Vec::new();
    let count = states.len();
    for state in states {
        translations.push(state.translation);
        healths.push(state.health);
        velocities.push(state.velocity);
        inventories.push(state.inventory);
    }

    let chunk = ChunkData::new(PLAYER, ghost_ids)
        .with_component(translations)
        .with_component(healths)
        .with_component(vec![Frozen; count])
        .with_component(velocities)
        .with_buffer(inventories);
    match owner {
        Some(owner) => chunk.with_owner(owner),
        None => chunk,
    }
}

pub fn crate_chunk(ghost_ids: Vec<GhostId>, translations: Vec<Translation>) -> ChunkData {
    ChunkData::new(CRATE, ghost_ids).with_component(translations)
}

pub fn inventory_chunk(ghost_ids: Vec<GhostId>, inventories: Vec<Vec<InventoryItem>>) -> ChunkData {
    ChunkData::new(INVENTORY, ghost_ids).with_buffer(inventories)
}
