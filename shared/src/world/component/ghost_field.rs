/// How a field is stored in its 32-bit snapshot word and delta encoded
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum GhostFieldKind {
    UInt,
    Int,
    Bool,
    /// Raw IEEE-754 bits, sent as a changed flag plus 32 bits
    Float,
    /// Float multiplied by the factor and rounded into an i32. Lossy by
    /// `0.5 / factor`, but delta encodes and predicts like an integer.
    Quantized(u32),
}

impl GhostFieldKind {
    /// Whether the delta predictor may extrapolate this field
    pub fn is_predictable(&self) -> bool {
        matches!(
            self,
            GhostFieldKind::UInt | GhostFieldKind::Int | GhostFieldKind::Quantized(_)
        )
    }
}

/// One replicated field of a ghost component
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GhostField {
    pub name: &'static str,
    pub kind: GhostFieldKind,
}

impl GhostField {
    pub const fn uint(name: &'static str) -> Self {
        Self {
            name,
            kind: GhostFieldKind::UInt,
        }
    }

    pub const fn int(name: &'static str) -> Self {
        Self {
            name,
            kind: GhostFieldKind::Int,
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: GhostFieldKind::Bool,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: GhostFieldKind::Float,
        }
    }

    pub const fn quantized(name: &'static str, factor: u32) -> Self {
        Self {
            name,
            kind: GhostFieldKind::Quantized(factor),
        }
    }
}

/// Which connections receive a component of a ghost
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GhostSendType {
    #[default]
    All,
    /// Only the connection owning the ghost's chunk
    OnlyOwner,
    /// Every connection except the owner
    OnlyNonOwner,
}

impl GhostSendType {
    pub fn is_sent_to<T: PartialEq>(&self, owner: Option<T>, connection: T) -> bool {
        match self {
            GhostSendType::All => true,
            GhostSendType::OnlyOwner => owner == Some(connection),
            GhostSendType::OnlyNonOwner => owner != Some(connection),
        }
    }
}
