//! Schema-level encoding constants: vertex prefixes and edge infix bytes.
//!
//! Every vertex IID starts with a one-byte kind prefix; every edge-view IID
//! carries a one-byte infix that encodes both the edge kind and the traversal
//! direction. The infix byte alone always determines the direction.

pub mod iid;
pub mod key;

/// Prefix byte for entity type vertices.
pub const PREFIX_ENTITY_TYPE: u8 = 0x10;
/// Prefix byte for relation type vertices.
pub const PREFIX_RELATION_TYPE: u8 = 0x11;
/// Prefix byte for role type vertices.
pub const PREFIX_ROLE_TYPE: u8 = 0x12;
/// Prefix byte for attribute type vertices.
pub const PREFIX_ATTRIBUTE_TYPE: u8 = 0x13;
/// Prefix byte for entity instance vertices.
pub const PREFIX_ENTITY: u8 = 0x30;
/// Prefix byte for relation instance vertices.
pub const PREFIX_RELATION: u8 = 0x31;
/// Prefix byte for role instance vertices.
pub const PREFIX_ROLE: u8 = 0x32;
/// Prefix byte for attribute instance vertices.
pub const PREFIX_ATTRIBUTE: u8 = 0x33;

/// The closed set of vertex kinds: schema types and their instances.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VertexKind {
    /// Schema vertex for an entity type.
    EntityType,
    /// Schema vertex for a relation type.
    RelationType,
    /// Schema vertex for a role type.
    RoleType,
    /// Schema vertex for an attribute type.
    AttributeType,
    /// Data vertex for an entity instance.
    Entity,
    /// Data vertex for a relation instance.
    Relation,
    /// Data vertex for a role instance.
    Role,
    /// Data vertex for an attribute instance.
    Attribute,
}

impl VertexKind {
    /// Every vertex kind, in prefix-byte order.
    pub const ALL: [VertexKind; 8] = [
        VertexKind::EntityType,
        VertexKind::RelationType,
        VertexKind::RoleType,
        VertexKind::AttributeType,
        VertexKind::Entity,
        VertexKind::Relation,
        VertexKind::Role,
        VertexKind::Attribute,
    ];

    /// The one-byte IID prefix for this kind.
    pub fn prefix(self) -> u8 {
        match self {
            VertexKind::EntityType => PREFIX_ENTITY_TYPE,
            VertexKind::RelationType => PREFIX_RELATION_TYPE,
            VertexKind::RoleType => PREFIX_ROLE_TYPE,
            VertexKind::AttributeType => PREFIX_ATTRIBUTE_TYPE,
            VertexKind::Entity => PREFIX_ENTITY,
            VertexKind::Relation => PREFIX_RELATION,
            VertexKind::Role => PREFIX_ROLE,
            VertexKind::Attribute => PREFIX_ATTRIBUTE,
        }
    }

    /// Recovers the kind from an IID prefix byte.
    pub fn from_prefix(byte: u8) -> Option<Self> {
        match byte {
            PREFIX_ENTITY_TYPE => Some(VertexKind::EntityType),
            PREFIX_RELATION_TYPE => Some(VertexKind::RelationType),
            PREFIX_ROLE_TYPE => Some(VertexKind::RoleType),
            PREFIX_ATTRIBUTE_TYPE => Some(VertexKind::AttributeType),
            PREFIX_ENTITY => Some(VertexKind::Entity),
            PREFIX_RELATION => Some(VertexKind::Relation),
            PREFIX_ROLE => Some(VertexKind::Role),
            PREFIX_ATTRIBUTE => Some(VertexKind::Attribute),
            _ => None,
        }
    }

    /// True for schema (type) vertices.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            VertexKind::EntityType
                | VertexKind::RelationType
                | VertexKind::RoleType
                | VertexKind::AttributeType
        )
    }

    /// True for data (thing) vertices.
    pub fn is_thing(self) -> bool {
        !self.is_type()
    }

    /// The instance kind whose vertices are typed by this schema kind.
    pub fn instance(self) -> Option<VertexKind> {
        match self {
            VertexKind::EntityType => Some(VertexKind::Entity),
            VertexKind::RelationType => Some(VertexKind::Relation),
            VertexKind::RoleType => Some(VertexKind::Role),
            VertexKind::AttributeType => Some(VertexKind::Attribute),
            _ => None,
        }
    }
}

/// Traversal direction of an adjacency or an edge view.
///
/// The forward view of an edge lives in the owner's out-adjacency, the
/// backward view in the adjacent vertex's in-adjacency.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Owner-to-adjacent (forward view).
    Out,
    /// Adjacent-to-owner (backward view).
    In,
}

impl Direction {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
        }
    }
}

const INFIX_SUB_FWD: u8 = 0x40;
const INFIX_OWNS_FWD: u8 = 0x41;
const INFIX_PLAYS_FWD: u8 = 0x42;
const INFIX_RELATES_FWD: u8 = 0x43;
const INFIX_HAS_FWD: u8 = 0x50;
const INFIX_RELATING_FWD: u8 = 0x51;
const INFIX_PLAYING_FWD: u8 = 0x52;
const INFIX_ROLEPLAYER_FWD: u8 = 0x53;
const INFIX_SUB_BWD: u8 = 0x60;
const INFIX_OWNS_BWD: u8 = 0x61;
const INFIX_PLAYS_BWD: u8 = 0x62;
const INFIX_RELATES_BWD: u8 = 0x63;
const INFIX_HAS_BWD: u8 = 0x70;
const INFIX_RELATING_BWD: u8 = 0x71;
const INFIX_PLAYING_BWD: u8 = 0x72;
const INFIX_ROLEPLAYER_BWD: u8 = 0x73;

/// The closed set of edge kinds.
///
/// Schema kinds connect type vertices and may carry an overridden vertex in
/// their stored value; thing kinds connect data vertices, may be inferred,
/// and the optimised `RolePlayer` kind additionally references the mediating
/// role instance and keys its adjacency buckets by role type (lookahead).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EdgeKind {
    /// Type-to-supertype edge.
    Sub,
    /// Type-owns-attribute-type edge.
    Owns,
    /// Type-plays-role-type edge.
    Plays,
    /// Relation-type-relates-role-type edge.
    Relates,
    /// Thing-has-attribute edge.
    Has,
    /// Relation-relating-role edge.
    Relating,
    /// Thing-playing-role edge.
    Playing,
    /// Optimised relation-to-player edge, mediated by a role instance.
    RolePlayer,
}

impl EdgeKind {
    /// Every edge kind, in infix-byte order.
    pub const ALL: [EdgeKind; 8] = [
        EdgeKind::Sub,
        EdgeKind::Owns,
        EdgeKind::Plays,
        EdgeKind::Relates,
        EdgeKind::Has,
        EdgeKind::Relating,
        EdgeKind::Playing,
        EdgeKind::RolePlayer,
    ];

    /// Infix byte of the forward (out) view.
    pub fn forward_infix(self) -> u8 {
        match self {
            EdgeKind::Sub => INFIX_SUB_FWD,
            EdgeKind::Owns => INFIX_OWNS_FWD,
            EdgeKind::Plays => INFIX_PLAYS_FWD,
            EdgeKind::Relates => INFIX_RELATES_FWD,
            EdgeKind::Has => INFIX_HAS_FWD,
            EdgeKind::Relating => INFIX_RELATING_FWD,
            EdgeKind::Playing => INFIX_PLAYING_FWD,
            EdgeKind::RolePlayer => INFIX_ROLEPLAYER_FWD,
        }
    }

    /// Infix byte of the backward (in) view.
    pub fn backward_infix(self) -> u8 {
        match self {
            EdgeKind::Sub => INFIX_SUB_BWD,
            EdgeKind::Owns => INFIX_OWNS_BWD,
            EdgeKind::Plays => INFIX_PLAYS_BWD,
            EdgeKind::Relates => INFIX_RELATES_BWD,
            EdgeKind::Has => INFIX_HAS_BWD,
            EdgeKind::Relating => INFIX_RELATING_BWD,
            EdgeKind::Playing => INFIX_PLAYING_BWD,
            EdgeKind::RolePlayer => INFIX_ROLEPLAYER_BWD,
        }
    }

    /// Infix byte of the view seen from the given adjacency direction.
    pub fn infix(self, direction: Direction) -> u8 {
        match direction {
            Direction::Out => self.forward_infix(),
            Direction::In => self.backward_infix(),
        }
    }

    /// Recovers kind and direction from an infix byte. Never ambiguous.
    pub fn from_infix(byte: u8) -> Option<(EdgeKind, Direction)> {
        for kind in EdgeKind::ALL {
            if kind.forward_infix() == byte {
                return Some((kind, Direction::Out));
            }
            if kind.backward_infix() == byte {
                return Some((kind, Direction::In));
            }
        }
        None
    }

    /// True for edges between schema vertices.
    pub fn is_schema(self) -> bool {
        matches!(
            self,
            EdgeKind::Sub | EdgeKind::Owns | EdgeKind::Plays | EdgeKind::Relates
        )
    }

    /// True for edges that carry a mediating (optimised) vertex.
    pub fn is_optimised(self) -> bool {
        matches!(self, EdgeKind::RolePlayer)
    }

    /// Number of lookahead type components in this kind's full infix.
    pub fn lookahead_arity(self) -> usize {
        match self {
            EdgeKind::RolePlayer => 1,
            _ => 0,
        }
    }
}
