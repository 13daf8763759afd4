use thiserror::Error;

/// Errors raised by ghost component registration and chunk column access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GhostError {
    /// Two different types share a stable hash
    #[error("Component '{new}' hashes to {hash:#018x}, the same as already registered component '{existing}'. Rename one of them")]
    HashCollision {
        hash: u64,
        existing: &'static str,
        new: &'static str,
    },

    /// A type was registered both as a component and as a buffer element
    #[error("'{name}' is already registered as a {registered_as}, it cannot also be registered as a {requested_as}")]
    KindConflict {
        name: &'static str,
        registered_as: &'static str,
        requested_as: &'static str,
    },

    /// A component kind used by a ghost type was never registered
    #[error("Component kind not registered with Protocol. Must call `add_component()` or `add_buffer()` during protocol initialization")]
    KindNotRegistered,

    /// A buffer element type without fields
    #[error("Buffer element '{name}' has no fields. Register it with `add_component()` instead")]
    EmptyBufferElement {
        name: &'static str,
    },

    /// A chunk column does not hold the type the serializer expects
    #[error("Chunk column for '{component}' has an unexpected type. Component columns must be Vec<C>, buffer columns Vec<Vec<E>>")]
    ColumnTypeMismatch {
        component: &'static str,
    },

    /// A chunk has no column for a component of its ghost type
    #[error("Chunk is missing the column for '{component}'")]
    MissingColumn {
        component: &'static str,
    },

    /// An entity index past the end of the column
    #[error("Entity index {index} is out of range for the '{component}' column of length {length}")]
    EntityOutOfRange {
        component: &'static str,
        index: usize,
        length: usize,
    },

    /// Two ghost types share a name
    #[error("Ghost type '{name}' is already registered")]
    DuplicateGhostType {
        name: &'static str,
    },
}
