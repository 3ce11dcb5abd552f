//! Per-target emission surface.
//!
//! [`crate::generate`] owns the schema walk and the dispatch over every
//! [`binschema_schema::FieldKind`] variant; everything that differs between
//! targets — identifier casing, the integer type names, whether a block is
//! braces or indentation, and the exact call a target's bit-buffer runtime
//! expects for "read a 24-bit big-endian int" — lives behind this trait.
//! Adding a fourth target means one new small impl, not touching the walk.

use binschema_codec::{Endianness, VarlenEncoding};
use binschema_expr::{BinOp, Literal, Path, UnOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    TypeScript,
    Rust,
    Python,
}

impl Target {
    pub fn name(&self) -> &'static str {
        match self {
            Target::TypeScript => "typescript",
            Target::Rust => "rust",
            Target::Python => "python",
        }
    }
}

pub trait Emitter {
    fn target(&self) -> Target;
    fn file_extension(&self) -> &'static str;

    /// Type-level identifier: a struct, union, or enum name.
    fn type_ident(&self, name: &str) -> String;
    /// Field or local-variable identifier.
    fn field_ident(&self, name: &str) -> String;
    /// A function identifier built from a verb and the type it operates on,
    /// e.g. `("decode", "PacketHeader")` -> `decode_packet_header` or
    /// `decodePacketHeader`.
    fn fn_ident(&self, verb: &str, type_name: &str) -> String;

    fn int_type(&self, bits: u32, signed: bool) -> String;
    fn bool_type(&self) -> &'static str;
    fn bytes_type(&self) -> &'static str;
    fn string_type(&self) -> &'static str;
    fn array_type(&self, element: &str) -> String;
    fn optional_type(&self, inner: &str) -> String;

    /// File-level preamble: runtime import plus any boilerplate the target
    /// needs before the first type definition (e.g. Rust's `use` lines).
    fn module_header(&self) -> String;

    fn struct_def(&self, name: &str, fields: &[(String, String)], instances: &[(String, String)]) -> String;
    fn union_def(&self, name: &str, variants: &[(String, String)]) -> String;

    fn comment(&self, text: &str) -> String;
    /// Wraps already-indented-by-caller body lines in this target's block
    /// syntax (braces, or a trailing colon for indentation-based targets).
    fn block(&self, lines: &[String]) -> String;
    fn function(&self, name: &str, params: &[(String, String)], return_type: &str, body: &[String]) -> String;

    fn for_count(&self, var: &str, count_expr: &str, body: &[String]) -> String;
    fn while_cond(&self, cond_expr: &str, body: &[String]) -> String;
    /// `branches` is an ordered `(condition, body)` list lowered to
    /// `if / else if` (or `elif`); `else_body` is the final fallback.
    fn if_chain(&self, branches: &[(String, Vec<String>)], else_body: Option<&[String]>) -> String;

    fn read_int(&self, bits: u32, signed: bool, endianness: Endianness) -> String;
    fn write_int(&self, bits: u32, signed: bool, endianness: Endianness, value_expr: &str) -> String;
    fn read_bits(&self, bits: u32, signed: bool) -> String;
    fn write_bits(&self, bits: u32, signed: bool, value_expr: &str) -> String;
    fn read_varint(&self, encoding: VarlenEncoding, signed: bool) -> String;
    fn write_varint(&self, encoding: VarlenEncoding, signed: bool, value_expr: &str) -> String;
    fn peek_bits(&self, bits: u32) -> String;
    fn read_bytes(&self, len_expr: &str) -> String;
    fn write_bytes(&self, value_expr: &str) -> String;

    fn decode_string(&self, bytes_expr: &str, encoding: &str) -> String;
    fn encode_string(&self, value_expr: &str, encoding: &str) -> String;

    fn binop_token(&self, op: BinOp) -> &'static str;
    fn unop_token(&self, op: UnOp) -> &'static str;
    fn literal(&self, lit: &Literal) -> String;
    /// Renders a dotted path against the in-scope decoded/to-be-encoded
    /// struct, honoring `_root` the same way the interpreter's
    /// `StructEnv` does.
    fn path_expr(&self, path: &Path) -> String;

    fn let_binding(&self, name: &str, value_expr: &str) -> String;
    /// Like [`Emitter::let_binding`] but the binding is reassigned later
    /// (array accumulators, optional slots) — distinct because Rust needs
    /// `mut` and the others don't.
    fn mutable_let_binding(&self, name: &str, value_expr: &str) -> String;
    fn assign(&self, target_expr: &str, value_expr: &str) -> String;
    fn field_access(&self, base: &str, field: &str) -> String;
    fn return_stmt(&self, expr: &str) -> String;
    fn push_stmt(&self, array_expr: &str, value_expr: &str) -> String;
    fn break_stmt(&self) -> String;
    fn empty_array_literal(&self) -> String;
    fn none_literal(&self) -> String;
    /// Wraps a decoded value for an `Optional` field's present branch —
    /// identity everywhere except Rust's `Option::Some`.
    fn some_wrap(&self, expr: &str) -> String {
        expr.to_string()
    }
    /// Trailing token appended to a fallible runtime call — `"?"` for Rust,
    /// empty for the two exception-raising targets.
    fn call_suffix(&self) -> &'static str {
        ""
    }

    /// Current byte offset of the reader cursor.
    fn reader_position(&self) -> String;
    /// Whether the reader has consumed the whole input.
    fn reader_at_eof(&self) -> String;
    /// Statement that repositions the reader's cursor.
    fn reader_seek(&self, pos_expr: &str) -> String;

    /// Current byte offset of the writer cursor — the encode-side analogue
    /// of [`Emitter::reader_position`], used by the placeholder/patch
    /// sequences `position_of` and `length_of.from_after_field` lower to.
    fn writer_position(&self) -> String;
    /// Statement that repositions the writer's cursor, used to rewind to a
    /// reserved placeholder and then resume at the saved position.
    fn writer_seek(&self, pos_expr: &str) -> String;

    /// Raises a decode/encode failure carrying `message_expr` (already
    /// rendered as a target string literal via [`Emitter::literal`]).
    fn raise_error(&self, message_expr: &str) -> String;

    fn decode_return_type(&self, type_name: &str) -> String;
    fn encode_return_type(&self) -> String;
    fn reader_param_type(&self) -> String;
    fn writer_param_type(&self) -> String;

    fn struct_literal(&self, type_name: &str, fields: &[String]) -> String;
    /// Builds the tagged value an encoded/decoded union variant is
    /// represented as; `value_expr` is the already-lowered payload.
    fn union_literal(&self, type_name: &str, variant: &str, value_expr: &str) -> String;

    /// Destructures an encoded union value into its `(variant, payload)`
    /// arms. `arms` is `(variant_name, payload_binding_name, body_using_binding)`.
    /// Default lowers to a `type`/`value`-tag if-chain; Rust overrides with a
    /// native `match` over its enum.
    fn destructure_union(&self, _type_name: &str, value_expr: &str, arms: &[(String, String, Vec<String>)]) -> String {
        let branches: Vec<(String, Vec<String>)> = arms
            .iter()
            .map(|(variant, binding, body)| {
                let tag_check = format!(
                    "{} {} {}",
                    self.field_access(value_expr, "type"),
                    self.binop_token(BinOp::Eq),
                    self.literal(&Literal::Str(variant.clone()))
                );
                let mut full_body = vec![self.let_binding(binding, &self.field_access(value_expr, "value"))];
                full_body.extend(body.iter().cloned());
                (tag_check, full_body)
            })
            .collect();
        self.if_chain(&branches, None)
    }
}
