//! Rust emitter: the systems target. Value shapes lower to `struct`s and
//! `enum`s with explicit integer widths, and every read/write goes through
//! the generated module's own small reader/writer runtime (a thin wrapper
//! with the same call shapes as `binschema-codec`'s `Reader`/`Writer`,
//! propagated with `?` rather than thrown).

use binschema_codec::{Endianness, VarlenEncoding};
use binschema_expr::{BinOp, Literal, Path, UnOp};

use crate::casing::{pascal_case, snake_case};
use crate::emitter::{Emitter, Target};
use crate::text::braced_block;
use crate::typescript::{binop_c_family, literal_c_family, path_expr_dotted, unop_c_family};

pub struct RustEmitter;

impl Emitter for RustEmitter {
    fn target(&self) -> Target {
        Target::Rust
    }
    fn file_extension(&self) -> &'static str {
        "rs"
    }

    fn type_ident(&self, name: &str) -> String {
        pascal_case(name)
    }
    fn field_ident(&self, name: &str) -> String {
        snake_case(name)
    }
    fn fn_ident(&self, verb: &str, type_name: &str) -> String {
        snake_case(&format!("{verb}_{type_name}"))
    }

    fn int_type(&self, bits: u32, signed: bool) -> String {
        let width = [8u32, 16, 32, 64].into_iter().find(|w| *w >= bits).unwrap_or(64);
        format!("{}{width}", if signed { "i" } else { "u" })
    }
    fn bool_type(&self) -> &'static str {
        "bool"
    }
    fn bytes_type(&self) -> &'static str {
        "Vec<u8>"
    }
    fn string_type(&self) -> &'static str {
        "String"
    }
    fn array_type(&self, element: &str) -> String {
        format!("Vec<{element}>")
    }
    fn optional_type(&self, inner: &str) -> String {
        format!("Option<{inner}>")
    }

    fn module_header(&self) -> String {
        "use crate::runtime::{BitReader, BitWriter, DecodeError, EncodeError};\n".to_string()
    }

    fn struct_def(&self, name: &str, fields: &[(String, String)], instances: &[(String, String)]) -> String {
        let mut lines: Vec<String> = fields.iter().map(|(n, t)| format!("pub {n}: {t},")).collect();
        for (n, t) in instances {
            lines.push(format!("/// lazy, see `get_{n}`"));
            lines.push(format!("pub {n}: {t},"));
        }
        format!("#[derive(Debug, Clone, PartialEq)]\npub struct {name}{}\n", braced_block(&lines, "    "))
    }

    fn union_def(&self, name: &str, variants: &[(String, String)]) -> String {
        let lines: Vec<String> = variants.iter().map(|(variant, payload)| format!("{variant}({payload}),")).collect();
        format!("#[derive(Debug, Clone, PartialEq)]\npub enum {name}{}\n", braced_block(&lines, "    "))
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}")
    }
    fn block(&self, lines: &[String]) -> String {
        braced_block(lines, "    ")
    }
    fn function(&self, name: &str, params: &[(String, String)], return_type: &str, body: &[String]) -> String {
        let sig_params: Vec<String> = params.iter().map(|(n, t)| format!("{n}: {t}")).collect();
        format!("pub fn {name}({}) -> {return_type}{}", sig_params.join(", "), self.block(body))
    }

    fn for_count(&self, var: &str, count_expr: &str, body: &[String]) -> String {
        format!("for {var} in 0..{count_expr}{}", self.block(body))
    }
    fn while_cond(&self, cond_expr: &str, body: &[String]) -> String {
        format!("while {cond_expr}{}", self.block(body))
    }
    fn if_chain(&self, branches: &[(String, Vec<String>)], else_body: Option<&[String]>) -> String {
        let mut out = String::new();
        for (i, (cond, body)) in branches.iter().enumerate() {
            if i > 0 {
                out.push_str(" else ");
            }
            out.push_str(&format!("if {cond}{}", self.block(body)));
        }
        if let Some(body) = else_body {
            out.push_str(&format!(" else{}", self.block(body)));
        }
        out
    }

    // NOTE: these intentionally do NOT append the trailing `?` themselves —
    // `crate::generate` appends `Emitter::call_suffix()` at every call site
    // for these particular methods, so the suffix lives in exactly one place.
    fn read_int(&self, bits: u32, signed: bool, endianness: Endianness) -> String {
        format!("reader.read_{}_{}()", self.int_type(bits, signed), endian_suffix(endianness))
    }
    fn write_int(&self, bits: u32, signed: bool, endianness: Endianness, value_expr: &str) -> String {
        format!("writer.write_{}_{}({value_expr})", self.int_type(bits, signed), endian_suffix(endianness))
    }
    fn read_bits(&self, bits: u32, signed: bool) -> String {
        format!("reader.read_bits({bits}, {signed})")
    }
    fn write_bits(&self, bits: u32, signed: bool, value_expr: &str) -> String {
        format!("writer.write_bits({bits}, {signed}, {value_expr})")
    }
    fn read_varint(&self, encoding: VarlenEncoding, signed: bool) -> String {
        format!("reader.read_varint(VarlenEncoding::{:?}, {signed})", encoding)
    }
    fn write_varint(&self, encoding: VarlenEncoding, signed: bool, value_expr: &str) -> String {
        format!("writer.write_varint(VarlenEncoding::{:?}, {signed}, {value_expr})", encoding)
    }
    fn peek_bits(&self, bits: u32) -> String {
        format!("reader.peek_bits({bits})")
    }
    fn read_bytes(&self, len_expr: &str) -> String {
        format!("reader.read_bytes({len_expr})")
    }
    fn write_bytes(&self, value_expr: &str) -> String {
        format!("writer.write_bytes({value_expr})")
    }

    // decode_string/encode_string are only ever called without an external
    // call_suffix(), so they keep their own `?` here.
    fn decode_string(&self, bytes_expr: &str, encoding: &str) -> String {
        format!("decode_string({bytes_expr}, \"{encoding}\")?")
    }
    fn encode_string(&self, value_expr: &str, encoding: &str) -> String {
        format!("encode_string({value_expr}, \"{encoding}\")?")
    }

    fn binop_token(&self, op: BinOp) -> &'static str {
        binop_c_family(op)
    }
    fn unop_token(&self, op: UnOp) -> &'static str {
        unop_c_family(op)
    }
    fn literal(&self, lit: &Literal) -> String {
        literal_c_family(lit)
    }
    fn path_expr(&self, path: &Path) -> String {
        path_expr_dotted(self, path)
    }

    fn let_binding(&self, name: &str, value_expr: &str) -> String {
        format!("let {name} = {value_expr};")
    }
    fn mutable_let_binding(&self, name: &str, value_expr: &str) -> String {
        format!("let mut {name} = {value_expr};")
    }
    fn assign(&self, target_expr: &str, value_expr: &str) -> String {
        format!("{target_expr} = {value_expr};")
    }
    fn field_access(&self, base: &str, field: &str) -> String {
        format!("{base}.{field}")
    }
    fn return_stmt(&self, expr: &str) -> String {
        format!("return Ok({expr});")
    }
    fn push_stmt(&self, array_expr: &str, value_expr: &str) -> String {
        format!("{array_expr}.push({value_expr});")
    }
    fn break_stmt(&self) -> String {
        "break;".to_string()
    }
    fn empty_array_literal(&self) -> String {
        "Vec::new()".to_string()
    }
    fn none_literal(&self) -> String {
        "None".to_string()
    }
    fn some_wrap(&self, expr: &str) -> String {
        format!("Some({expr})")
    }
    fn call_suffix(&self) -> &'static str {
        "?"
    }

    fn reader_position(&self) -> String {
        "reader.byte_position()".to_string()
    }
    fn reader_at_eof(&self) -> String {
        "reader.at_eof()".to_string()
    }
    fn reader_seek(&self, pos_expr: &str) -> String {
        format!("reader.seek({pos_expr})?;")
    }

    fn writer_position(&self) -> String {
        "writer.byte_position()".to_string()
    }
    fn writer_seek(&self, pos_expr: &str) -> String {
        format!("writer.seek({pos_expr})?;")
    }

    fn raise_error(&self, message_expr: &str) -> String {
        format!("return Err(DecodeError::new({message_expr}));")
    }

    fn decode_return_type(&self, type_name: &str) -> String {
        format!("Result<{type_name}, DecodeError>")
    }
    fn encode_return_type(&self) -> String {
        "Result<(), EncodeError>".to_string()
    }
    fn reader_param_type(&self) -> String {
        "&mut BitReader".to_string()
    }
    fn writer_param_type(&self) -> String {
        "&mut BitWriter".to_string()
    }

    fn struct_literal(&self, type_name: &str, fields: &[String]) -> String {
        format!("{type_name} {{ {} }}", fields.join(", "))
    }
    fn union_literal(&self, type_name: &str, variant: &str, value_expr: &str) -> String {
        format!("{type_name}::{}({value_expr})", pascal_case(variant))
    }
    fn destructure_union(&self, type_name: &str, value_expr: &str, arms: &[(String, String, Vec<String>)]) -> String {
        let lines: Vec<String> = arms
            .iter()
            .map(|(variant, binding, body)| {
                let pattern = format!("{type_name}::{}({binding})", pascal_case(variant));
                format!("{pattern} =>{}", self.block(body))
            })
            .collect();
        format!("match {value_expr}{}", braced_block(&lines, "    "))
    }
}

fn endian_suffix(e: Endianness) -> &'static str {
    match e {
        Endianness::Big => "be",
        Endianness::Little => "le",
    }
}
