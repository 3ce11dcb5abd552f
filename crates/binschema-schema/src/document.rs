//! JSON-deserializable schema document.
//!
//! These types describe the *shape* of a schema as authored in JSON. They
//! are intended to be parsed straight off disk with `serde_json` and then
//! normalized (see [`crate::normalize`]) into the internal model the
//! validator and planner operate on. Unknown keys are rejected by
//! `#[serde(deny_unknown_fields)]` throughout, per the external-interface
//! contract: "unknown keys are rejected".

use indexmap::IndexMap;
use serde::Deserialize;

fn default_presence_bits() -> u32 {
    8
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigDef {
    pub endianness: Option<EndiannessDef>,
    pub bit_order: Option<BitOrderDef>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndiannessDef {
    Big,
    Little,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BitOrderDef {
    MsbFirst,
    LsbFirst,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub config: ConfigDef,
    pub types: IndexMap<String, TypeDef>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TypeDef {
    Sequence {
        fields: Vec<FieldDef>,
        #[serde(default)]
        instances: Vec<InstanceDef>,
    },
    DiscriminatedUnion {
        discriminator: DiscriminatorDef,
        variants: Vec<VariantDef>,
    },
    Alias {
        #[serde(flatten)]
        field: FieldShapeDef,
    },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(flatten)]
    pub shape: FieldShapeDef,
}

/// The part of a field definition shared between named sequence fields and
/// an alias type's single unnamed field.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct FieldShapeDef {
    #[serde(flatten)]
    pub kind: FieldKindDef,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub r#const: Option<ConstValueDef>,
    #[serde(default)]
    pub computed: Option<ComputedDef>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum ConstValueDef {
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum ComputedDef {
    LengthOf { target: String },
    LengthOfFromAfterField { after: String },
    PositionOf { target: String },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum FieldKindDef {
    FixedInt {
        bits: u32,
        #[serde(default)]
        signed: bool,
        #[serde(default)]
        endianness: Option<EndiannessDef>,
    },
    BitField {
        bits: u32,
        #[serde(default)]
        signed: bool,
        #[serde(default)]
        bit_order: Option<BitOrderDef>,
    },
    VarInt {
        encoding: VarlenEncodingDef,
        #[serde(default)]
        signed: bool,
    },
    FixedArray {
        element: Box<FieldKindDef>,
        count: u64,
    },
    LengthPrefixedArray {
        element: Box<FieldKindDef>,
        length_bits: u32,
    },
    ByteLengthPrefixedArray {
        element: Box<FieldKindDef>,
        length_bits: u32,
    },
    LengthPrefixedItemsArray {
        element: Box<FieldKindDef>,
        length_bits: u32,
    },
    FieldReferencedArray {
        element: Box<FieldKindDef>,
        count_path: String,
    },
    NullTerminatedArray {
        element: Box<FieldKindDef>,
    },
    EofTerminatedArray {
        element: Box<FieldKindDef>,
    },
    Str {
        bytes: Box<FieldKindDef>,
        encoding: StrEncodingDef,
    },
    TypeRef {
        type_name: String,
    },
    DiscriminatedUnion {
        discriminator: DiscriminatorDef,
        variants: Vec<VariantDef>,
    },
    Pointer {
        offset_path: String,
        #[serde(default)]
        relative_to: PointerBaseDef,
        #[serde(default)]
        offset_mask: Option<u64>,
        target: Box<FieldKindDef>,
    },
    Optional {
        inner: Box<FieldKindDef>,
        #[serde(default = "default_presence_bits")]
        presence_bits: u32,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VarlenEncodingDef {
    Der,
    Leb128,
    Ebml,
    Vlq,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StrEncodingDef {
    Utf8,
    Ascii,
    Latin1,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PointerBaseDef {
    #[default]
    StartOfStream,
    StartOfParent,
    CurrentPosition,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum DiscriminatorDef {
    Peek {
        width: u32,
        #[serde(default)]
        endianness: Option<EndiannessDef>,
    },
    Field {
        path: String,
    },
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct VariantDef {
    pub name: String,
    pub when: String,
    pub target: FieldKindDef,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct InstanceDef {
    pub name: String,
    pub target: FieldKindDef,
    pub position: PositionDef,
    #[serde(default)]
    pub size: Option<SizeDef>,
    #[serde(default)]
    pub alignment: Option<u64>,
    #[serde(default)]
    pub condition: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum PositionDef {
    Literal(i64),
    Path(String),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum SizeDef {
    Literal(u64),
    Expr(String),
}
