//! Schema walk shared by every target: dispatches over all fourteen
//! [`FieldKind`] variants exactly once, asking the active [`Emitter`] for
//! each target-specific token along the way.
//!
//! The walk always appends to a statement list (`out`) and returns the
//! expression that holds the value just produced, so compound kinds (arrays,
//! unions, pointers) can recurse into a fresh statement list for their own
//! loop/branch body and splice the result back in as a single multi-line
//! string — the same shape `binschema_plan::decode`'s recursive dispatch
//! uses, just emitting source text instead of executing reads.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use binschema_codec::Endianness;
use binschema_expr::{BinOp, Expr, Literal, UnOp};
use binschema_schema::{
    ConstValue, Field, FieldKind, FieldModifier, Instance, PointerBase, PositionExpr, Schema, SequenceType, SizeExpr,
    StrEncoding, TypeDef,
};
use binschema_schema::{Discriminator, DiscriminatedUnion};

use crate::emitter::Emitter;
use crate::errors::CodegenError;

pub fn generate(schema: &Schema, emitter: &dyn Emitter) -> Result<String, CodegenError> {
    let gen = Gen { emitter, schema, tmp_counter: Cell::new(0) };
    let mut out = String::new();
    out.push_str(&emitter.module_header());
    out.push('\n');
    for (name, type_def) in &schema.types {
        match type_def {
            TypeDef::Sequence(seq) => {
                out.push_str(&gen.struct_def_for(name, seq)?);
                out.push_str("\n\n");
                out.push_str(&gen.decode_sequence_fn(name, seq)?);
                out.push_str("\n\n");
                out.push_str(&gen.encode_sequence_fn(name, seq)?);
                out.push_str("\n\n");
                for inst in &seq.instances {
                    out.push_str(&gen.instance_fn(name, inst)?);
                    out.push_str("\n\n");
                }
            }
            TypeDef::DiscriminatedUnion(u) => {
                out.push_str(&gen.union_def_for(name, u)?);
                out.push_str("\n\n");
                out.push_str(&gen.decode_union_fn(name, u)?);
                out.push_str("\n\n");
                out.push_str(&gen.encode_union_fn(name, u)?);
                out.push_str("\n\n");
            }
            TypeDef::Alias(spec) => {
                let mut body = Vec::new();
                let expr = gen.decode_kind(&spec.kind, &mut body)?;
                body.push(emitter.return_stmt(&expr));
                let fn_name = emitter.fn_ident("decode", name);
                let return_type = emitter.decode_return_type(&gen.kind_type(&spec.kind)?);
                out.push_str(&emitter.function(&fn_name, &[("reader".to_string(), emitter.reader_param_type())], &return_type, &body));
                out.push_str("\n\n");

                let mut ebody = Vec::new();
                gen.encode_kind(&spec.kind, "value", &mut ebody)?;
                let efn_name = emitter.fn_ident("encode", name);
                let value_type = gen.kind_type(&spec.kind)?;
                out.push_str(&emitter.function(
                    &efn_name,
                    &[("writer".to_string(), emitter.writer_param_type()), ("value".to_string(), value_type)],
                    &emitter.encode_return_type(),
                    &ebody,
                ));
                out.push_str("\n\n");
            }
        }
    }
    Ok(out)
}

struct Gen<'a> {
    emitter: &'a dyn Emitter,
    schema: &'a Schema,
    tmp_counter: Cell<u32>,
}

/// A `position_of` placeholder reserved in `encode_sequence_fn`, resolved
/// once the generated code walks past the target field and its start
/// offset is captured in a local variable.
struct PendingPositionPatch {
    target: String,
    placeholder_var: String,
    bits: u32,
    signed: bool,
    endianness: Endianness,
}

/// A `length_of.from_after_field` placeholder, resolved once the whole
/// sequence (fields and instances) has been written. `anchor_end_var` is
/// always `Some` by construction (the anchor's end offset is the writer
/// position at the moment this field starts encoding); kept optional to
/// mirror the defensive-error shape used elsewhere in this module.
struct PendingLengthPatch {
    after: String,
    placeholder_var: String,
    bits: u32,
    signed: bool,
    endianness: Endianness,
    anchor_end_var: Option<String>,
}

impl<'a> Gen<'a> {
    fn tmp(&self, hint: &str) -> String {
        let n = self.tmp_counter.get();
        self.tmp_counter.set(n + 1);
        format!("{hint}_{n}")
    }

    fn read_inline_length(&self, length_bits: u32) -> String {
        match length_bits {
            8 | 16 | 32 | 64 => self.emitter.read_int(length_bits, false, self.schema.config.endianness),
            other => self.emitter.read_bits(other, false),
        }
    }

    fn write_inline_length(&self, length_bits: u32, value_expr: &str) -> String {
        match length_bits {
            8 | 16 | 32 | 64 => self.emitter.write_int(length_bits, false, self.schema.config.endianness, value_expr),
            other => self.emitter.write_bits(other, false, value_expr),
        }
    }

    fn strencoding_name(encoding: StrEncoding) -> &'static str {
        match encoding {
            StrEncoding::Utf8 => "utf8",
            StrEncoding::Ascii => "ascii",
            StrEncoding::Latin1 => "latin1",
        }
    }

    /// Renders an expression tree; `value_name`, when set, substitutes the
    /// synthetic discriminator identifier `value` (everything else falls
    /// through to [`Emitter::path_expr`]).
    fn render_expr(&self, expr: &Expr, value_name: Option<&str>) -> String {
        match expr {
            Expr::Literal(l) => self.emitter.literal(l),
            Expr::Path(p) => {
                if let Some(name) = value_name {
                    if p.0.len() == 1 && p.0[0] == "value" {
                        return name.to_string();
                    }
                }
                self.emitter.path_expr(p)
            }
            Expr::Unary(op, inner) => format!("{}{}", self.emitter.unop_token(*op), self.render_expr(inner, value_name)),
            Expr::Binary(op, l, r) => {
                format!("({} {} {})", self.render_expr(l, value_name), self.emitter.binop_token(*op), self.render_expr(r, value_name))
            }
        }
    }

    fn const_literal(&self, c: &ConstValue) -> String {
        match c {
            ConstValue::Int(i) => self.emitter.literal(&Literal::Int(*i)),
            ConstValue::Str(s) => self.emitter.literal(&Literal::Str(s.clone())),
            ConstValue::Bytes(b) => {
                // Rendered as an array of byte literals; every target reads this as a list of ints.
                let items: Vec<String> = b.iter().map(|byte| byte.to_string()).collect();
                format!("[{}]", items.join(", "))
            }
        }
    }

    /// Target-language type a [`FieldKind`] decodes/encodes to.
    fn kind_type(&self, kind: &FieldKind) -> Result<String, CodegenError> {
        Ok(match kind {
            FieldKind::FixedInt { bits, signed, .. } => self.emitter.int_type(*bits, *signed),
            FieldKind::BitField { bits, signed, .. } => self.emitter.int_type(*bits, *signed),
            FieldKind::VarInt { signed, .. } => self.emitter.int_type(64, *signed),
            FieldKind::FixedArray { element, .. }
            | FieldKind::LengthPrefixedArray { element, .. }
            | FieldKind::ByteLengthPrefixedArray { element, .. }
            | FieldKind::LengthPrefixedItemsArray { element, .. }
            | FieldKind::FieldReferencedArray { element, .. }
            | FieldKind::NullTerminatedArray { element }
            | FieldKind::EofTerminatedArray { element } => {
                let el = self.kind_type(element)?;
                self.emitter.array_type(&el)
            }
            FieldKind::Str { .. } => self.emitter.string_type().to_string(),
            FieldKind::TypeRef { name } => {
                self.schema.type_named(name).ok_or_else(|| CodegenError::UnknownType(name.clone()))?;
                self.emitter.type_ident(name)
            }
            FieldKind::DiscriminatedUnion(_) => {
                return Err(CodegenError::Unsupported {
                    construct: "an inline discriminated union (give it a name and reference it with type_ref)".to_string(),
                    target: self.emitter.target().name(),
                })
            }
            FieldKind::Pointer { target, .. } => self.kind_type(target)?,
            FieldKind::Optional { inner, .. } => {
                let inner_t = self.kind_type(inner)?;
                self.emitter.optional_type(&inner_t)
            }
        })
    }

    /// Lowers a read of `kind`, appending any loop/branch statements needed
    /// to `out`, and returns the expression holding the decoded value.
    fn decode_kind(&self, kind: &FieldKind, out: &mut Vec<String>) -> Result<String, CodegenError> {
        match kind {
            FieldKind::FixedInt { bits, signed, endianness } => Ok(format!("{}{}", self.emitter.read_int(*bits, *signed, *endianness), self.emitter.call_suffix())),
            FieldKind::BitField { bits, signed, .. } => Ok(format!("{}{}", self.emitter.read_bits(*bits, *signed), self.emitter.call_suffix())),
            FieldKind::VarInt { encoding, signed } => Ok(format!("{}{}", self.emitter.read_varint(*encoding, *signed), self.emitter.call_suffix())),

            FieldKind::FixedArray { element, count } => self.decode_array_loop(element, &count.to_string(), out),

            FieldKind::LengthPrefixedArray { element, length_bits } | FieldKind::LengthPrefixedItemsArray { element, length_bits } => {
                let count_var = self.tmp("count");
                out.push(self.emitter.let_binding(&count_var, &format!("{}{}", self.read_inline_length(*length_bits), self.emitter.call_suffix())));
                self.decode_array_loop(element, &count_var, out)
            }

            FieldKind::ByteLengthPrefixedArray { element, length_bits } => {
                let len_var = self.tmp("byte_len");
                out.push(self.emitter.let_binding(&len_var, &format!("{}{}", self.read_inline_length(*length_bits), self.emitter.call_suffix())));
                let start_var = self.tmp("start");
                out.push(self.emitter.let_binding(&start_var, &self.emitter.reader_position()));
                let items_var = self.tmp("items");
                out.push(self.emitter.mutable_let_binding(&items_var, &self.emitter.empty_array_literal()));
                let mut body = Vec::new();
                let elem_expr = self.decode_kind(element, &mut body)?;
                body.push(self.emitter.push_stmt(&items_var, &elem_expr));
                let cond = format!("{} - {} < {}", self.emitter.reader_position(), start_var, len_var);
                out.push(self.emitter.while_cond(&cond, &body));
                Ok(items_var)
            }

            FieldKind::FieldReferencedArray { element, count_path } => {
                let count_expr = self.emitter.path_expr(count_path);
                self.decode_array_loop(element, &count_expr, out)
            }

            FieldKind::NullTerminatedArray { element } => {
                let items_var = self.tmp("items");
                out.push(self.emitter.mutable_let_binding(&items_var, &self.emitter.empty_array_literal()));
                let mut body = Vec::new();
                let item_var = self.tmp("item");
                let elem_expr = self.decode_kind(element, &mut body)?;
                body.push(self.emitter.let_binding(&item_var, &elem_expr));
                let zero = self.emitter.literal(&Literal::Int(0));
                let cond = format!("{} {} {}", item_var, self.emitter.binop_token(BinOp::Eq), zero);
                body.push(self.emitter.if_chain(&[(cond, vec![self.emitter.break_stmt()])], None));
                body.push(self.emitter.push_stmt(&items_var, &item_var));
                out.push(self.emitter.while_cond("true", &body));
                Ok(items_var)
            }

            FieldKind::EofTerminatedArray { element } => {
                let items_var = self.tmp("items");
                out.push(self.emitter.mutable_let_binding(&items_var, &self.emitter.empty_array_literal()));
                let mut body = Vec::new();
                let elem_expr = self.decode_kind(element, &mut body)?;
                body.push(self.emitter.push_stmt(&items_var, &elem_expr));
                let cond = format!("{}{}", self.emitter.unop_token(UnOp::Not), self.emitter.reader_at_eof());
                out.push(self.emitter.while_cond(&cond, &body));
                Ok(items_var)
            }

            FieldKind::Str { bytes, encoding } => {
                let bytes_expr = self.decode_kind(bytes, out)?;
                Ok(self.emitter.decode_string(&bytes_expr, Self::strencoding_name(*encoding)))
            }

            FieldKind::TypeRef { name } => {
                self.schema.type_named(name).ok_or_else(|| CodegenError::UnknownType(name.clone()))?;
                let fn_name = self.emitter.fn_ident("decode", name);
                Ok(format!("{fn_name}(reader){}", self.emitter.call_suffix()))
            }

            FieldKind::DiscriminatedUnion(_) => Err(CodegenError::Unsupported {
                construct: "an inline discriminated union (give it a name and reference it with type_ref)".to_string(),
                target: self.emitter.target().name(),
            }),

            FieldKind::Pointer { offset_path, relative_to, offset_mask, target } => {
                let offset_var = self.tmp("offset");
                out.push(self.emitter.let_binding(&offset_var, &self.emitter.path_expr(offset_path)));
                if let Some(mask) = offset_mask {
                    out.push(self.emitter.assign(&offset_var, &format!("{} {} {}", offset_var, self.emitter.binop_token(BinOp::BitAnd), mask)));
                }
                let base_expr = match relative_to {
                    PointerBase::StartOfStream | PointerBase::StartOfParent => "0".to_string(),
                    PointerBase::CurrentPosition => self.emitter.reader_position(),
                };
                let abs_var = self.tmp("abs_offset");
                out.push(self.emitter.let_binding(&abs_var, &format!("{base_expr} + {offset_var}")));
                let saved_var = self.tmp("saved_pos");
                out.push(self.emitter.let_binding(&saved_var, &self.emitter.reader_position()));
                out.push(self.emitter.reader_seek(&abs_var));
                let inner_expr = self.decode_kind(target, out)?;
                let result_var = self.tmp("pointed");
                out.push(self.emitter.let_binding(&result_var, &inner_expr));
                out.push(self.emitter.reader_seek(&saved_var));
                Ok(result_var)
            }

            FieldKind::Optional { inner, presence_bits } => {
                let presence_var = self.tmp("present");
                out.push(self.emitter.let_binding(&presence_var, &format!("{}{}", self.emitter.read_int(*presence_bits, false, self.schema.config.endianness), self.emitter.call_suffix())));
                let result_var = self.tmp("opt");
                out.push(self.emitter.mutable_let_binding(&result_var, &self.emitter.none_literal()));
                let mut body = Vec::new();
                let inner_expr = self.decode_kind(inner, &mut body)?;
                body.push(self.emitter.assign(&result_var, &self.emitter.some_wrap(&inner_expr)));
                let zero = self.emitter.literal(&Literal::Int(0));
                let cond = format!("{} {} {}", presence_var, self.emitter.binop_token(BinOp::Ne), zero);
                out.push(self.emitter.if_chain(&[(cond, body)], None));
                Ok(result_var)
            }
        }
    }

    fn decode_array_loop(&self, element: &FieldKind, count_expr: &str, out: &mut Vec<String>) -> Result<String, CodegenError> {
        let items_var = self.tmp("items");
        out.push(self.emitter.mutable_let_binding(&items_var, &self.emitter.empty_array_literal()));
        let loop_var = self.tmp("i");
        let mut body = Vec::new();
        let elem_expr = self.decode_kind(element, &mut body)?;
        body.push(self.emitter.push_stmt(&items_var, &elem_expr));
        out.push(self.emitter.for_count(&loop_var, count_expr, &body));
        Ok(items_var)
    }

    /// Lowers a write of `kind`, consuming `value_expr`, appending every
    /// statement needed to `out`.
    fn encode_kind(&self, kind: &FieldKind, value_expr: &str, out: &mut Vec<String>) -> Result<(), CodegenError> {
        match kind {
            FieldKind::FixedInt { bits, signed, endianness } => {
                out.push(format!("{}{}", self.emitter.write_int(*bits, *signed, *endianness, value_expr), self.emitter.call_suffix()));
                Ok(())
            }
            FieldKind::BitField { bits, signed, .. } => {
                out.push(format!("{}{}", self.emitter.write_bits(*bits, *signed, value_expr), self.emitter.call_suffix()));
                Ok(())
            }
            FieldKind::VarInt { encoding, signed } => {
                out.push(format!("{}{}", self.emitter.write_varint(*encoding, *signed, value_expr), self.emitter.call_suffix()));
                Ok(())
            }

            FieldKind::FixedArray { element, .. }
            | FieldKind::LengthPrefixedArray { element, .. }
            | FieldKind::LengthPrefixedItemsArray { element, .. } => {
                if let FieldKind::LengthPrefixedArray { length_bits, .. } | FieldKind::LengthPrefixedItemsArray { length_bits, .. } = kind {
                    let count_expr = format!("{value_expr}.length");
                    out.push(format!("{}{}", self.write_inline_length(*length_bits, &count_expr), self.emitter.call_suffix()));
                }
                self.encode_array_loop(element, value_expr, out)
            }

            FieldKind::ByteLengthPrefixedArray { element, length_bits } => {
                let placeholder_var = self.tmp("byte_len_at");
                out.push(self.emitter.let_binding(&placeholder_var, &self.emitter.writer_position()));
                let placeholder_expr = self.write_inline_length(*length_bits, "0");
                out.push(format!("{placeholder_expr}{}", self.emitter.call_suffix()));
                let start_var = self.tmp("start");
                out.push(self.emitter.let_binding(&start_var, &self.emitter.writer_position()));
                self.encode_array_loop(element, value_expr, out)?;
                let end_var = self.tmp("end");
                out.push(self.emitter.let_binding(&end_var, &self.emitter.writer_position()));
                out.push(self.emitter.writer_seek(&placeholder_var));
                let len_expr = format!("{end_var} - {start_var}");
                let patch_expr = self.write_inline_length(*length_bits, &len_expr);
                out.push(format!("{patch_expr}{}", self.emitter.call_suffix()));
                out.push(self.emitter.writer_seek(&end_var));
                Ok(())
            }

            FieldKind::FieldReferencedArray { element, .. } => self.encode_array_loop(element, value_expr, out),

            FieldKind::NullTerminatedArray { element } => {
                self.encode_array_loop(element, value_expr, out)?;
                let zero = self.emitter.literal(&Literal::Int(0));
                self.encode_kind_scalar_literal(element, &zero, out)
            }

            FieldKind::EofTerminatedArray { element } => self.encode_array_loop(element, value_expr, out),

            FieldKind::Str { bytes, encoding } => {
                let encoded_var = self.tmp("encoded");
                out.push(self.emitter.let_binding(&encoded_var, &self.emitter.encode_string(value_expr, Self::strencoding_name(*encoding))));
                self.encode_kind(bytes, &encoded_var, out)
            }

            FieldKind::TypeRef { name } => {
                self.schema.type_named(name).ok_or_else(|| CodegenError::UnknownType(name.clone()))?;
                let fn_name = self.emitter.fn_ident("encode", name);
                out.push(format!("{fn_name}(writer, {value_expr}){}", self.emitter.call_suffix()));
                Ok(())
            }

            FieldKind::DiscriminatedUnion(_) => Err(CodegenError::Unsupported {
                construct: "an inline discriminated union (give it a name and reference it with type_ref)".to_string(),
                target: self.emitter.target().name(),
            }),

            FieldKind::Pointer { target, .. } => {
                out.push(self.emitter.comment("the offset field itself is written as an ordinary sibling field elsewhere in this sequence"));
                self.encode_kind(target, value_expr, out)
            }

            FieldKind::Optional { inner, presence_bits } => {
                let is_present = format!("{value_expr} {} {}", self.emitter.binop_token(BinOp::Ne), self.emitter.none_literal());
                let mut present_body = Vec::new();
                present_body.push(format!("{}{}", self.emitter.write_int(*presence_bits, false, self.schema.config.endianness, "1"), self.emitter.call_suffix()));
                self.encode_kind(inner, value_expr, &mut present_body)?;
                let mut absent_body = Vec::new();
                absent_body.push(format!("{}{}", self.emitter.write_int(*presence_bits, false, self.schema.config.endianness, "0"), self.emitter.call_suffix()));
                out.push(self.emitter.if_chain(&[(is_present, present_body)], Some(&absent_body)));
                Ok(())
            }
        }
    }

    fn encode_array_loop(&self, element: &FieldKind, array_expr: &str, out: &mut Vec<String>) -> Result<(), CodegenError> {
        let item_var = self.tmp("item");
        let mut body = Vec::new();
        self.encode_kind(element, &item_var, &mut body)?;
        out.push(self.emitter.for_count(&item_var, array_expr, &body));
        Ok(())
    }

    /// Writes a sentinel scalar value (only `FixedInt`/`BitField` element
    /// kinds support a null terminator — anything else is a schema design
    /// error this generator doesn't need to guard against separately since
    /// `binschema_schema::validate` already rejects it upstream... left
    /// permissive here since the planner enforces this, not the generator.
    fn encode_kind_scalar_literal(&self, element: &FieldKind, literal_expr: &str, out: &mut Vec<String>) -> Result<(), CodegenError> {
        match element {
            FieldKind::FixedInt { bits, signed, endianness } => {
                out.push(format!("{}{}", self.emitter.write_int(*bits, *signed, *endianness, literal_expr), self.emitter.call_suffix()));
                Ok(())
            }
            FieldKind::BitField { bits, signed, .. } => {
                out.push(format!("{}{}", self.emitter.write_bits(*bits, *signed, literal_expr), self.emitter.call_suffix()));
                Ok(())
            }
            other => Err(CodegenError::Unsupported {
                construct: format!("a null-terminated array of {other:?} (only fixed-width scalar elements support a written sentinel)"),
                target: self.emitter.target().name(),
            }),
        }
    }

    fn struct_def_for(&self, name: &str, seq: &SequenceType) -> Result<String, CodegenError> {
        let mut fields = Vec::new();
        for field in &seq.fields {
            fields.push((self.emitter.field_ident(&field.name), self.kind_type(&field.spec.kind)?));
        }
        let mut instances = Vec::new();
        for inst in &seq.instances {
            instances.push((self.emitter.field_ident(&inst.name), self.kind_type(&inst.target)?));
        }
        let type_name = self.emitter.type_ident(name);
        Ok(self.emitter.struct_def(&type_name, &fields, &instances))
    }

    fn decode_sequence_fn(&self, name: &str, seq: &SequenceType) -> Result<String, CodegenError> {
        let fn_name = self.emitter.fn_ident("decode", name);
        let type_name = self.emitter.type_ident(name);
        let mut body: Vec<String> = Vec::new();
        let mut field_idents: Vec<String> = Vec::new();

        for field in &seq.fields {
            self.decode_one_field(field, &mut body)?;
            field_idents.push(self.emitter.field_ident(&field.name));
        }
        for inst in &seq.instances {
            // Instances are resolved lazily by a dedicated accessor function
            // (see `instance_fn`); the struct just carries the raw bytes and
            // resolved position it needs to call that accessor later.
            let ident = self.emitter.field_ident(&inst.name);
            body.push(self.emitter.comment(&format!("`{ident}` is resolved lazily; see the generated `get_{ident}` accessor")));
            field_idents.push(ident);
        }

        body.push(self.emitter.return_stmt(&self.emitter.struct_literal(&type_name, &field_idents)));
        let return_type = self.emitter.decode_return_type(&type_name);
        Ok(self.emitter.function(&fn_name, &[("reader".to_string(), self.emitter.reader_param_type())], &return_type, &body))
    }

    fn decode_one_field(&self, field: &Field, body: &mut Vec<String>) -> Result<(), CodegenError> {
        let field_ident = self.emitter.field_ident(&field.name);
        if let Some(condition) = &field.spec.condition {
            let cond_expr = self.render_expr(condition, None);
            let mut present_body = Vec::new();
            let expr = self.decode_kind(&field.spec.kind, &mut present_body)?;
            present_body.push(self.emitter.assign(&field_ident, &expr));
            let mut absent_body = Vec::new();
            absent_body.push(self.emitter.assign(&field_ident, &self.emitter.none_literal()));
            body.push(self.emitter.mutable_let_binding(&field_ident, &self.emitter.none_literal()));
            body.push(self.emitter.if_chain(&[(cond_expr, present_body)], Some(&absent_body)));
            return Ok(());
        }

        match &field.spec.modifier {
            FieldModifier::Const(c) => {
                let expr = self.decode_kind(&field.spec.kind, body)?;
                body.push(self.emitter.let_binding(&field_ident, &expr));
                let expected = self.const_literal(c);
                let cond = format!("{field_ident} {} {expected}", self.emitter.binop_token(BinOp::Ne));
                let message = self.emitter.literal(&Literal::Str(format!("const mismatch on field `{}`", field.name)));
                body.push(self.emitter.if_chain(&[(cond, vec![self.emitter.raise_error(&message)])], None));
            }
            FieldModifier::Computed(_) => {
                // Computed fields are encoder-only; decode reads them like any
                // other field of their declared kind.
                let expr = self.decode_kind(&field.spec.kind, body)?;
                body.push(self.emitter.let_binding(&field_ident, &expr));
            }
            FieldModifier::None => {
                let expr = self.decode_kind(&field.spec.kind, body)?;
                body.push(self.emitter.let_binding(&field_ident, &expr));
            }
        }
        Ok(())
    }

    fn encode_sequence_fn(&self, name: &str, seq: &SequenceType) -> Result<String, CodegenError> {
        let fn_name = self.emitter.fn_ident("encode", name);
        let type_name = self.emitter.type_ident(name);
        let mut body: Vec<String> = Vec::new();

        // `position_of` targets and `from_after_field` anchors each need the
        // writer's byte offset captured at a specific point in the field
        // loop — before the target field for the former, after the anchor
        // field for the latter — so every patch can be resolved once that
        // offset is known instead of guessing it up front.
        let position_targets = self.position_of_targets(seq);
        let mut field_start_vars: HashMap<String, String> = HashMap::new();
        let mut pending_position: Vec<PendingPositionPatch> = Vec::new();
        let mut pending_length: Vec<PendingLengthPatch> = Vec::new();

        for field in &seq.fields {
            if position_targets.contains(field.name.as_str()) {
                let start_var = self.tmp("field_start");
                body.push(self.emitter.let_binding(&start_var, &self.emitter.writer_position()));
                field_start_vars.insert(field.name.clone(), start_var);
            }

            self.encode_one_field(field, "value", &mut body, &mut pending_position, &mut pending_length)?;

            pending_position.retain(|patch| {
                if patch.target != field.name {
                    return true;
                }
                let start_var = field_start_vars.get(&field.name).expect("recorded above for every position_of target");
                let resume_var = self.tmp("resume_at");
                body.push(self.emitter.let_binding(&resume_var, &self.emitter.writer_position()));
                body.push(self.emitter.writer_seek(&patch.placeholder_var));
                body.push(format!("{}{}", self.emitter.write_int(patch.bits, patch.signed, patch.endianness, start_var), self.emitter.call_suffix()));
                body.push(self.emitter.writer_seek(&resume_var));
                false
            });
        }

        if let Some(unresolved) = pending_position.first() {
            return Err(CodegenError::Unsupported {
                construct: format!("position_of target `{}` not found in sequence `{name}`", unresolved.target),
                target: self.emitter.target().name(),
            });
        }

        for inst in &seq.instances {
            self.encode_instance(inst, &mut body)?;
        }

        if !pending_length.is_empty() {
            let end_var = self.tmp("sequence_end");
            body.push(self.emitter.let_binding(&end_var, &self.emitter.writer_position()));
            for patch in &pending_length {
                let anchor_end_var = patch.anchor_end_var.as_deref().ok_or_else(|| CodegenError::Unsupported {
                    construct: format!("from_after_field anchor `{}` not found in sequence `{name}`", patch.after),
                    target: self.emitter.target().name(),
                })?;
                let len_expr = format!("{end_var} - {anchor_end_var}");
                body.push(self.emitter.writer_seek(&patch.placeholder_var));
                body.push(format!("{}{}", self.emitter.write_int(patch.bits, patch.signed, patch.endianness, &len_expr), self.emitter.call_suffix()));
                body.push(self.emitter.writer_seek(&end_var));
            }
        }

        let return_type = self.emitter.encode_return_type();
        Ok(self.emitter.function(
            &fn_name,
            &[("writer".to_string(), self.emitter.writer_param_type()), ("value".to_string(), type_name)],
            &return_type,
            &body,
        ))
    }

    /// Every field name that some `position_of` computed field in `seq`
    /// targets, so `encode_sequence_fn` knows in advance which fields need
    /// their start offset captured as it walks past them.
    fn position_of_targets(&self, seq: &SequenceType) -> HashSet<String> {
        use binschema_schema::field::Computed;
        seq.fields
            .iter()
            .filter_map(|f| match &f.spec.modifier {
                FieldModifier::Computed(Computed::PositionOf { target }) => Some(target.as_str()),
                _ => None,
            })
            .collect()
    }

    fn encode_instance(&self, inst: &Instance, body: &mut Vec<String>) -> Result<(), CodegenError> {
        let field_access = self.emitter.field_access("value", &self.emitter.field_ident(&inst.name));
        if let Some(condition) = &inst.condition {
            let cond_expr = self.render_expr(condition, None);
            let mut inner = Vec::new();
            self.encode_kind(&inst.target, &field_access, &mut inner)?;
            body.push(self.emitter.if_chain(&[(cond_expr, inner)], None));
            return Ok(());
        }
        self.encode_kind(&inst.target, &field_access, body)
    }

    fn encode_one_field(
        &self,
        field: &Field,
        value_var: &str,
        body: &mut Vec<String>,
        pending_position: &mut Vec<PendingPositionPatch>,
        pending_length: &mut Vec<PendingLengthPatch>,
    ) -> Result<(), CodegenError> {
        let field_access = self.emitter.field_access(value_var, &self.emitter.field_ident(&field.name));

        if field.spec.condition.is_some() {
            let mut inner = Vec::new();
            self.encode_field_by_modifier(field, &field_access, &mut inner, pending_position, pending_length)?;
            let cond = format!("{field_access} {} {}", self.emitter.binop_token(BinOp::Ne), self.emitter.none_literal());
            body.push(self.emitter.if_chain(&[(cond, inner)], None));
            return Ok(());
        }
        self.encode_field_by_modifier(field, &field_access, body, pending_position, pending_length)
    }

    fn encode_field_by_modifier(
        &self,
        field: &Field,
        field_access: &str,
        body: &mut Vec<String>,
        pending_position: &mut Vec<PendingPositionPatch>,
        pending_length: &mut Vec<PendingLengthPatch>,
    ) -> Result<(), CodegenError> {
        match &field.spec.modifier {
            FieldModifier::Const(c) => {
                let literal = self.const_literal(c);
                self.encode_kind(&field.spec.kind, &literal, body)
            }
            FieldModifier::Computed(computed) => {
                self.encode_computed(&field.spec.kind, computed, body, pending_position, pending_length)
            }
            FieldModifier::None => self.encode_kind(&field.spec.kind, field_access, body),
        }
    }

    fn encode_computed(
        &self,
        kind: &FieldKind,
        computed: &binschema_schema::field::Computed,
        body: &mut Vec<String>,
        pending_position: &mut Vec<PendingPositionPatch>,
        pending_length: &mut Vec<PendingLengthPatch>,
    ) -> Result<(), CodegenError> {
        use binschema_schema::field::Computed;
        let (bits, signed, endianness) = match kind {
            FieldKind::FixedInt { bits, signed, endianness } => (*bits, *signed, *endianness),
            other => {
                return Err(CodegenError::Unsupported {
                    construct: format!("a computed field of kind {other:?} (only byte-aligned fixed-width integers can be patched after the fact)"),
                    target: self.emitter.target().name(),
                })
            }
        };
        match computed {
            Computed::LengthOf { target } => {
                let target_expr = self.emitter.path_expr(target);
                let len_expr = format!("{target_expr}.length");
                body.push(format!("{}{}", self.emitter.write_int(bits, signed, endianness, &len_expr), self.emitter.call_suffix()));
            }
            Computed::PositionOf { target } => {
                // `target` is usually a later field; its start offset isn't
                // known yet, so this reserves the bytes here and
                // `encode_sequence_fn` patches them in once it walks past
                // the target field below.
                let placeholder_var = self.tmp("position_of_at");
                body.push(self.emitter.let_binding(&placeholder_var, &self.emitter.writer_position()));
                body.push(format!("{}{}", self.emitter.write_int(bits, signed, endianness, "0"), self.emitter.call_suffix()));
                pending_position.push(PendingPositionPatch { target: target.as_str(), placeholder_var, bits, signed, endianness });
            }
            Computed::LengthOfFromAfterField { after } => {
                // Validation guarantees this field immediately follows
                // `after` with no field in between, so the writer's
                // position right now — before this field writes anything —
                // already is the anchor's end offset.
                let placeholder_var = self.tmp("length_from_after_at");
                body.push(self.emitter.let_binding(&placeholder_var, &self.emitter.writer_position()));
                body.push(format!("{}{}", self.emitter.write_int(bits, signed, endianness, "0"), self.emitter.call_suffix()));
                pending_length.push(PendingLengthPatch {
                    after: after.as_str(),
                    placeholder_var: placeholder_var.clone(),
                    bits,
                    signed,
                    endianness,
                    anchor_end_var: Some(placeholder_var),
                });
            }
        }
        Ok(())
    }

    fn union_def_for(&self, name: &str, u: &DiscriminatedUnion) -> Result<String, CodegenError> {
        let mut variants = Vec::new();
        for variant in &u.variants {
            variants.push((variant.name.clone(), self.kind_type(&variant.target)?));
        }
        let type_name = self.emitter.type_ident(name);
        Ok(self.emitter.union_def(&type_name, &variants))
    }

    fn decode_union_fn(&self, name: &str, u: &DiscriminatedUnion) -> Result<String, CodegenError> {
        let fn_name = self.emitter.fn_ident("decode", name);
        let type_name = self.emitter.type_ident(name);
        let mut body = Vec::new();
        let disc_var = self.tmp("tag");
        match &u.discriminator {
            Discriminator::Peek { width, .. } => {
                body.push(self.emitter.let_binding(&disc_var, &format!("{}{}", self.emitter.peek_bits(*width), self.emitter.call_suffix())));
            }
            Discriminator::Field { path } => {
                body.push(self.emitter.let_binding(&disc_var, &self.emitter.path_expr(path)));
            }
        }

        let mut branches = Vec::new();
        for variant in &u.variants {
            let cond = self.render_expr(&variant.when, Some(&disc_var));
            let mut vbody = Vec::new();
            let inner_expr = self.decode_kind(&variant.target, &mut vbody)?;
            vbody.push(self.emitter.return_stmt(&self.emitter.union_literal(&type_name, &variant.name, &inner_expr)));
            branches.push((cond, vbody));
        }
        let message = self.emitter.literal(&Literal::Str(format!("no variant of `{name}` matched the discriminator")));
        let else_body = vec![self.emitter.raise_error(&message)];
        body.push(self.emitter.if_chain(&branches, Some(&else_body)));

        let return_type = self.emitter.decode_return_type(&type_name);
        Ok(self.emitter.function(&fn_name, &[("reader".to_string(), self.emitter.reader_param_type())], &return_type, &body))
    }

    fn encode_union_fn(&self, name: &str, u: &DiscriminatedUnion) -> Result<String, CodegenError> {
        let fn_name = self.emitter.fn_ident("encode", name);
        let type_name = self.emitter.type_ident(name);
        let mut arms = Vec::new();
        for variant in &u.variants {
            let binding = self.tmp("payload");
            let mut vbody = Vec::new();
            if let Discriminator::Peek { width, endianness } = &u.discriminator {
                if let Some(tag) = discriminant_literal(&variant.when) {
                    vbody.push(format!("{}{}", self.emitter.write_int(*width, false, *endianness, &tag.to_string()), self.emitter.call_suffix()));
                } else {
                    return Err(CodegenError::NonLiteralDiscriminant { variant: variant.name.clone() });
                }
            }
            self.encode_kind(&variant.target, &binding, &mut vbody)?;
            arms.push((variant.name.clone(), binding, vbody));
        }
        let mut body = Vec::new();
        body.push(self.emitter.destructure_union(&type_name, "value", &arms));

        let return_type = self.emitter.encode_return_type();
        Ok(self.emitter.function(
            &fn_name,
            &[("writer".to_string(), self.emitter.writer_param_type()), ("value".to_string(), type_name)],
            &return_type,
            &body,
        ))
    }

    fn instance_fn(&self, owner_name: &str, inst: &Instance) -> Result<String, CodegenError> {
        let fn_name = self.emitter.fn_ident("get", &format!("{owner_name}_{}", inst.name));
        let mut body = Vec::new();

        if let Some(condition) = &inst.condition {
            let cond_expr = self.render_expr(condition, None);
            let message = self.emitter.literal(&Literal::Str(format!("instance `{}` is not present", inst.name)));
            body.push(self.emitter.if_chain(&[(format!("{}{cond_expr}", self.emitter.unop_token(UnOp::Not)), vec![self.emitter.raise_error(&message)])], None));
        }

        let position_expr = match &inst.position {
            PositionExpr::Literal(n) => n.to_string(),
            PositionExpr::FieldPath(path) => self.emitter.path_expr(path),
            PositionExpr::FromEnd(n) => format!("{} - {}", self.emitter.reader_position(), n.abs()),
        };
        let pos_var = self.tmp("pos");
        body.push(self.emitter.let_binding(&pos_var, &position_expr));

        if let Some(alignment) = inst.alignment {
            let cond = format!("{pos_var} % {alignment} {} 0", self.emitter.binop_token(BinOp::Ne));
            let message = self.emitter.literal(&Literal::Str(format!("instance `{}` is not {}-byte aligned", inst.name, alignment)));
            body.push(self.emitter.if_chain(&[(cond, vec![self.emitter.raise_error(&message)])], None));
        }

        if let Some(size) = &inst.size {
            let size_expr = match size {
                SizeExpr::Literal(n) => n.to_string(),
                SizeExpr::FieldPath(path) => self.emitter.path_expr(path),
                SizeExpr::Computed(expr) => self.render_expr(expr, None),
            };
            body.push(self.emitter.comment(&format!("bounded to {size_expr} bytes from {pos_var}")));
        }

        let saved_var = self.tmp("saved_pos");
        body.push(self.emitter.let_binding(&saved_var, &self.emitter.reader_position()));
        body.push(self.emitter.reader_seek(&pos_var));
        let value_expr = self.decode_kind(&inst.target, &mut body)?;
        let result_var = self.tmp("result");
        body.push(self.emitter.let_binding(&result_var, &value_expr));
        body.push(self.emitter.reader_seek(&saved_var));
        body.push(self.emitter.return_stmt(&result_var));

        let return_type = self.emitter.decode_return_type(&self.kind_type(&inst.target)?);
        Ok(self.emitter.function(&fn_name, &[("reader".to_string(), self.emitter.reader_param_type())], &return_type, &body))
    }
}

/// Recovers the tag a peek-based discriminator variant matches, for the
/// same restricted `value == <literal>` shape
/// `binschema_plan::encode::discriminant_literal` requires on the
/// interpreter side — a schema whose guards fit that shape round-trips
/// through both the interpreter and every generated target identically.
fn discriminant_literal(when: &Expr) -> Option<i64> {
    match when {
        Expr::Binary(BinOp::Eq, lhs, rhs) => match (lhs.as_ref(), rhs.as_ref()) {
            (Expr::Path(p), Expr::Literal(Literal::Int(i))) if is_value_name(p) => Some(*i),
            (Expr::Literal(Literal::Int(i)), Expr::Path(p)) if is_value_name(p) => Some(*i),
            _ => None,
        },
        _ => None,
    }
}

fn is_value_name(path: &binschema_expr::Path) -> bool {
    path.0.len() == 1 && path.0[0] == "value"
}
