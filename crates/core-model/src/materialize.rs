//! Element formats and path command encoding for the materialize pipeline
//! (spec.md §4.7, §4.9).

use crate::expr::FieldExprId;
use crate::slot::SlotId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    U16,
    I32,
    F32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferFormat {
    pub components: u8,
    pub element_type: ElementType,
}

impl BufferFormat {
    pub const fn new(components: u8, element_type: ElementType) -> Self {
        Self {
            components,
            element_type,
        }
    }
}

/// Key into the Frame Cache's per-frame buffer map
/// (spec.md §4.4: `(fieldExprId, domainSlot, format)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferKey {
    pub field_expr: FieldExprId,
    pub domain_slot: SlotId,
    pub format: BufferFormat,
}

/// Path drawing commands, encoded as `u16` opcodes in the path command
/// buffer (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum PathCommand {
    MoveTo = 0,
    LineTo = 1,
    QuadTo = 2,
    CubicTo = 3,
    Close = 4,
}

impl PathCommand {
    pub fn param_count(self) -> usize {
        match self {
            PathCommand::MoveTo | PathCommand::LineTo => 2,
            PathCommand::QuadTo => 4,
            PathCommand::CubicTo => 6,
            PathCommand::Close => 0,
        }
    }

    pub fn from_u16(v: u16) -> Option<Self> {
        match v {
            0 => Some(PathCommand::MoveTo),
            1 => Some(PathCommand::LineTo),
            2 => Some(PathCommand::QuadTo),
            3 => Some(PathCommand::CubicTo),
            4 => Some(PathCommand::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Frustum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipMode {
    Discard,
    Clamp,
}
