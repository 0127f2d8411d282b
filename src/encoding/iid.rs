//! Typed, prefix-structured identifiers for vertices and edge views.
//!
//! An edge-view IID is the concatenation `owner ‖ infix ‖ adjacent
//! [‖ optimised key]`. Scan prefixes are built with the same join logic, so
//! a partial IID is always a true byte prefix of every matching full IID and
//! range-prefix scans over the ordered store work component by component.

use std::fmt;

use smallvec::SmallVec;

use crate::bytes::{ByteArray, LONG_SIZE, SHORT_SIZE};
use crate::encoding::key::KeyGenerator;
use crate::encoding::{Direction, EdgeKind, VertexKind};
use crate::error::Result;

/// Byte length of a type vertex IID: prefix + 2-byte key.
pub const TYPE_IID_LENGTH: usize = 1 + SHORT_SIZE;
/// Byte length of a thing vertex key.
pub const THING_KEY_LENGTH: usize = LONG_SIZE;
/// Byte length of a thing vertex IID: prefix + type IID + 8-byte key.
pub const THING_IID_LENGTH: usize = 1 + TYPE_IID_LENGTH + THING_KEY_LENGTH;

/// A vertex identifier: one kind-prefix byte plus a per-type unique key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexIid {
    bytes: ByteArray,
}

impl VertexIid {
    /// Wraps raw bytes, asserting the prefix and length are well formed.
    pub fn of(bytes: ByteArray) -> Self {
        let kind = VertexKind::from_prefix(bytes.get(0)).expect("unknown vertex prefix byte");
        let expected = if kind.is_type() {
            TYPE_IID_LENGTH
        } else {
            THING_IID_LENGTH
        };
        assert_eq!(
            bytes.length(),
            expected,
            "vertex IID length mismatch for {kind:?}"
        );
        VertexIid { bytes }
    }

    /// Builds a type vertex IID from a kind and a 2-byte key.
    pub fn new_type(kind: VertexKind, key: &ByteArray) -> Self {
        assert!(kind.is_type(), "type IID requires a schema kind");
        assert_eq!(key.length(), SHORT_SIZE, "type key must be 2 bytes");
        Self::of(ByteArray::join(&[&ByteArray::of(&[kind.prefix()]), key]))
    }

    /// Builds a thing vertex IID typed by `type_iid` with an 8-byte key.
    pub fn new_thing(type_iid: &VertexIid, key: &ByteArray) -> Self {
        let instance = type_iid
            .kind()
            .instance()
            .expect("thing IID requires a schema type IID");
        assert_eq!(key.length(), THING_KEY_LENGTH, "thing key must be 8 bytes");
        Self::of(ByteArray::join(&[
            &ByteArray::of(&[instance.prefix()]),
            type_iid.bytes(),
            key,
        ]))
    }

    /// Generates a fresh type vertex IID using the per-prefix key counter.
    pub fn generate_type(keys: &KeyGenerator, kind: VertexKind) -> Result<Self> {
        Ok(Self::new_type(kind, &keys.next_type_key(kind)?))
    }

    /// Generates a fresh thing vertex IID using the per-type key counter.
    pub fn generate_thing(keys: &KeyGenerator, type_iid: &VertexIid) -> Self {
        Self::new_thing(type_iid, &keys.next_thing_key(type_iid))
    }

    /// Reads a vertex IID out of a larger buffer as a zero-copy view.
    pub fn extract(bytes: &ByteArray, at: usize) -> Self {
        let kind = VertexKind::from_prefix(bytes.get(at)).expect("unknown vertex prefix byte");
        let len = if kind.is_type() {
            TYPE_IID_LENGTH
        } else {
            THING_IID_LENGTH
        };
        VertexIid {
            bytes: bytes.view(at, at + len),
        }
    }

    /// The vertex kind encoded in the prefix byte.
    pub fn kind(&self) -> VertexKind {
        VertexKind::from_prefix(self.bytes.get(0)).expect("unknown vertex prefix byte")
    }

    /// The raw IID bytes.
    pub fn bytes(&self) -> &ByteArray {
        &self.bytes
    }

    /// Total IID length in bytes.
    pub fn length(&self) -> usize {
        self.bytes.length()
    }

    /// For a thing vertex, the embedded type vertex IID.
    pub fn type_iid(&self) -> VertexIid {
        assert!(self.kind().is_thing(), "only thing IIDs embed a type IID");
        VertexIid::extract(&self.bytes, 1)
    }

    /// The per-type unique key suffix.
    pub fn key(&self) -> ByteArray {
        if self.kind().is_type() {
            self.bytes.view_from(1)
        } else {
            self.bytes.view_from(1 + TYPE_IID_LENGTH)
        }
    }
}

impl fmt::Debug for VertexIid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VertexIid({:?} 0x{})",
            self.kind(),
            hex::encode(self.bytes.as_slice())
        )
    }
}

/// The infix segment of an edge-view IID: one kind/direction byte, followed
/// by any lookahead type components.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfixIid {
    bytes: ByteArray,
}

impl InfixIid {
    /// Builds an infix, possibly with a partial lookahead chain.
    ///
    /// Passing more lookahead components than the kind declares, or a
    /// component that is not a type IID, is a programming error.
    pub fn new(kind: EdgeKind, direction: Direction, lookahead: &[VertexIid]) -> Self {
        assert!(
            lookahead.len() <= kind.lookahead_arity(),
            "{kind:?} admits at most {} lookahead components, got {}",
            kind.lookahead_arity(),
            lookahead.len()
        );
        let infix_byte = ByteArray::of(&[kind.infix(direction)]);
        let mut parts: SmallVec<[&ByteArray; 3]> = SmallVec::new();
        parts.push(&infix_byte);
        for component in lookahead {
            assert!(
                component.kind().is_type(),
                "lookahead components must be type IIDs"
            );
            parts.push(component.bytes());
        }
        InfixIid {
            bytes: ByteArray::join(&parts),
        }
    }

    /// Reads a complete infix (full lookahead chain) out of a larger buffer.
    pub fn extract(bytes: &ByteArray, at: usize) -> Self {
        let (kind, _) = EdgeKind::from_infix(bytes.get(at)).expect("unknown infix byte");
        let len = 1 + kind.lookahead_arity() * TYPE_IID_LENGTH;
        InfixIid {
            bytes: bytes.view(at, at + len),
        }
    }

    /// The edge kind encoded in the infix byte.
    pub fn kind(&self) -> EdgeKind {
        EdgeKind::from_infix(self.bytes.get(0)).expect("unknown infix byte").0
    }

    /// The direction encoded in the infix byte.
    pub fn direction(&self) -> Direction {
        EdgeKind::from_infix(self.bytes.get(0)).expect("unknown infix byte").1
    }

    /// Number of lookahead components present.
    pub fn lookahead_len(&self) -> usize {
        (self.bytes.length() - 1) / TYPE_IID_LENGTH
    }

    /// True when every declared lookahead component is present.
    pub fn is_complete(&self) -> bool {
        self.lookahead_len() == self.kind().lookahead_arity()
    }

    /// The lookahead components, in order.
    pub fn lookahead(&self) -> SmallVec<[VertexIid; 2]> {
        let mut out = SmallVec::new();
        let mut at = 1;
        while at < self.bytes.length() {
            out.push(VertexIid::extract(&self.bytes, at));
            at += TYPE_IID_LENGTH;
        }
        out
    }

    /// The raw infix bytes.
    pub fn bytes(&self) -> &ByteArray {
        &self.bytes
    }

    /// Total infix length in bytes.
    pub fn length(&self) -> usize {
        self.bytes.length()
    }
}

impl fmt::Debug for InfixIid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InfixIid({:?}/{:?} 0x{})",
            self.kind(),
            self.direction(),
            hex::encode(self.bytes.as_slice())
        )
    }
}

/// A full edge-view identifier as stored in the ordered key-value store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeViewIid {
    bytes: ByteArray,
}

impl EdgeViewIid {
    /// Composes a full edge-view IID.
    ///
    /// `optimised_key` is required exactly when the kind is optimised; the
    /// infix must then carry its complete lookahead chain so the IID can be
    /// parsed back.
    pub fn new(
        owner: &VertexIid,
        infix: &InfixIid,
        adjacent: &VertexIid,
        optimised_key: Option<&ByteArray>,
    ) -> Self {
        assert!(infix.is_complete(), "edge-view IID requires a complete infix");
        assert_eq!(
            infix.kind().is_optimised(),
            optimised_key.is_some(),
            "optimised key required iff the edge kind is optimised"
        );
        let mut parts: SmallVec<[&ByteArray; 4]> =
            SmallVec::from_slice(&[owner.bytes(), infix.bytes(), adjacent.bytes()]);
        if let Some(key) = optimised_key {
            assert_eq!(key.length(), THING_KEY_LENGTH, "optimised key must be 8 bytes");
            parts.push(key);
        }
        EdgeViewIid {
            bytes: ByteArray::join(&parts),
        }
    }

    /// Wraps raw stored bytes, asserting they parse as an edge-view IID.
    pub fn of(bytes: ByteArray) -> Self {
        let iid = EdgeViewIid { bytes };
        let owner = iid.owner();
        let infix = iid.infix();
        let adjacent = VertexIid::extract(&iid.bytes, owner.length() + infix.length());
        let consumed = owner.length() + infix.length() + adjacent.length();
        let trailing = iid.bytes.length() - consumed;
        if infix.kind().is_optimised() {
            assert_eq!(trailing, THING_KEY_LENGTH, "optimised edge IID missing key suffix");
        } else {
            assert_eq!(trailing, 0, "unexpected trailing bytes in edge IID");
        }
        iid
    }

    /// The owning vertex (the adjacency this view belongs to).
    pub fn owner(&self) -> VertexIid {
        VertexIid::extract(&self.bytes, 0)
    }

    /// The infix segment, complete with lookahead components.
    pub fn infix(&self) -> InfixIid {
        InfixIid::extract(&self.bytes, self.owner().length())
    }

    /// The vertex on the far side of this view.
    pub fn adjacent(&self) -> VertexIid {
        let owner = self.owner();
        let infix = InfixIid::extract(&self.bytes, owner.length());
        VertexIid::extract(&self.bytes, owner.length() + infix.length())
    }

    /// Reconstructs the optimised (mediating) vertex for optimised kinds.
    ///
    /// The stored suffix is only the vertex key; the full IID is rebuilt from
    /// the lookahead type component carried by the infix.
    pub fn optimised(&self) -> Option<VertexIid> {
        let infix = self.infix();
        if !infix.kind().is_optimised() {
            return None;
        }
        let key = self.bytes.view_from(self.bytes.length() - THING_KEY_LENGTH);
        let role_type = infix.lookahead().into_iter().next().expect("complete infix");
        Some(VertexIid::new_thing(&role_type, &key))
    }

    /// The raw IID bytes.
    pub fn bytes(&self) -> &ByteArray {
        &self.bytes
    }
}

impl fmt::Debug for EdgeViewIid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeViewIid(0x{})", hex::encode(self.bytes.as_slice()))
    }
}

/// Builds the storage scan prefix for a possibly-partial edge key.
///
/// Shares the join logic of [`EdgeViewIid::new`], so the result is a byte
/// prefix of every matching full edge-view IID.
pub fn scan_prefix(
    owner: &VertexIid,
    kind: EdgeKind,
    direction: Direction,
    lookahead: &[VertexIid],
) -> ByteArray {
    let infix = InfixIid::new(kind, direction, lookahead);
    ByteArray::join(&[owner.bytes(), infix.bytes()])
}
