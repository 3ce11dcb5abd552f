//! Definition of logical fields used to build a [crate::Schema].

use binschema_codec::{BitOrder, Endianness};
use binschema_expr::Expr;

/// A single named field in a sequence type.
#[derive(Debug, Clone)]
pub struct Field {
    /// Name used in the decoded result map and in path expressions.
    pub name: String,
    pub spec: FieldSpec,
}

/// A field's shape plus the modifiers that apply uniformly across every kind.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub kind: FieldKind,
    pub modifier: FieldModifier,
    /// Skip this field entirely (neither read nor written) when present and
    /// the expression evaluates to `false`.
    pub condition: Option<Expr>,
}

impl FieldSpec {
    pub fn new(kind: FieldKind) -> Self {
        FieldSpec {
            kind,
            modifier: FieldModifier::None,
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Expr) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_modifier(mut self, modifier: FieldModifier) -> Self {
        self.modifier = modifier;
        self
    }
}

/// `const` and `computed` are mutually exclusive; validated in
/// [`crate::validate`].
#[derive(Debug, Clone)]
pub enum FieldModifier {
    None,
    /// Encoders ignore any user-supplied value and write the literal;
    /// decoders read and must equal it.
    Const(ConstValue),
    /// Filled in at encode time from other fields; see [`Computed`].
    Computed(Computed),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Bytes(Vec<u8>),
    Str(String),
}

/// The closed set of field shapes a schema can describe. Every operation in
/// the planner and code generator dispatches on this enum exhaustively —
/// adding a twelfth kind here means adding a match arm everywhere.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// A fixed-width integer, e.g. `u32`, `i16`.
    FixedInt {
        bits: u32,
        signed: bool,
        endianness: Endianness,
    },
    /// A packed bit group narrower than a byte, e.g. a 3-bit flag field.
    BitField {
        bits: u32,
        signed: bool,
        bit_order: BitOrder,
    },
    /// A self-delimiting variable-length integer (DER/LEB128/EBML/VLQ).
    VarInt { encoding: binschema_codec::VarlenEncoding, signed: bool },
    /// Exactly `count` elements of `element`, back to back.
    FixedArray { element: Box<FieldKind>, count: u64 },
    /// An inline `length_bits`-wide unsigned count precedes the elements.
    LengthPrefixedArray { element: Box<FieldKind>, length_bits: u32 },
    /// An inline `length_bits`-wide unsigned *byte* length (not an element
    /// count) precedes the elements; elements are decoded until that many
    /// bytes have been consumed.
    ByteLengthPrefixedArray { element: Box<FieldKind>, length_bits: u32 },
    /// An inline `length_bits`-wide item count precedes the elements, and
    /// each element is itself preceded by its own encoded length.
    LengthPrefixedItemsArray { element: Box<FieldKind>, length_bits: u32 },
    /// The element count is given by the already-decoded value of another
    /// field (as opposed to a length read fresh from the stream).
    FieldReferencedArray { element: Box<FieldKind>, count_path: Path },
    /// Elements continue until a sentinel element value is read.
    NullTerminatedArray { element: Box<FieldKind> },
    /// Elements continue until the end of the enclosing byte range.
    EofTerminatedArray { element: Box<FieldKind> },
    /// A string decoded from a byte array with a chosen encoding and length
    /// strategy.
    Str { bytes: Box<FieldKind>, encoding: StrEncoding },
    /// A reference to another named type in the same schema.
    TypeRef { name: String },
    /// An inline tagged union: a discriminator selects one of several named
    /// variants, each itself a [`FieldKind`].
    DiscriminatedUnion(Box<crate::union::DiscriminatedUnion>),
    /// An offset (absolute or relative) naming where a nested value lives;
    /// the pointed-to value is decoded lazily, like an instance.
    Pointer {
        offset_path: Path,
        relative_to: PointerBase,
        offset_mask: Option<u64>,
        target: Box<FieldKind>,
    },
    /// One presence value (`presence_bits` wide; zero means absent, nonzero
    /// means present) followed by `inner` iff present. Distinct from the
    /// `condition` on the enclosing [`FieldSpec`], which skips a field
    /// entirely with no presence marker at all — `Optional` is for a
    /// `TypeRef`/union that needs an explicit "absent" wire representation.
    Optional { inner: Box<FieldKind>, presence_bits: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrEncoding {
    Utf8,
    Ascii,
    Latin1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerBase {
    StartOfStream,
    StartOfParent,
    CurrentPosition,
}

/// A dotted reference to another field already present in the same decode
/// scope, e.g. `header.count` or `_root.version`. Reuses
/// [`binschema_expr::Path`] rather than inventing a parallel path type.
pub type Path = binschema_expr::Path;

/// Things a schema can compute rather than read directly from the stream.
#[derive(Debug, Clone)]
pub enum Computed {
    /// Number of elements or bytes in the array/string at `target`.
    LengthOf { target: Path },
    /// Number of bytes from immediately after `after` up to the current
    /// write position, patched in once that span is fully written.
    LengthOfFromAfterField { after: Path },
    /// Absolute byte position at which `target` begins.
    PositionOf { target: Path },
}
