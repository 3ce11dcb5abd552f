//! TypeScript emitter: the statically-typed target. Value shapes lower to
//! `interface`s, discriminated unions to tagged-union type aliases, and
//! every read/write goes through a small `BitReader`/`BitWriter` runtime
//! (`./runtime`) that mirrors `binschema-codec`'s own `Reader`/`Writer`
//! call shapes one-for-one.

use binschema_codec::{Endianness, VarlenEncoding};
use binschema_expr::{BinOp, Literal, Path, UnOp};

use crate::casing::{camel_case, pascal_case};
use crate::emitter::{Emitter, Target};
use crate::text::braced_block;

pub struct TypeScriptEmitter;

impl Emitter for TypeScriptEmitter {
    fn target(&self) -> Target {
        Target::TypeScript
    }
    fn file_extension(&self) -> &'static str {
        "ts"
    }

    fn type_ident(&self, name: &str) -> String {
        pascal_case(name)
    }
    fn field_ident(&self, name: &str) -> String {
        camel_case(name)
    }
    fn fn_ident(&self, verb: &str, type_name: &str) -> String {
        camel_case(&format!("{verb}_{type_name}"))
    }

    fn int_type(&self, bits: u32, signed: bool) -> String {
        let _ = signed;
        if bits > 32 {
            "bigint".to_string()
        } else {
            "number".to_string()
        }
    }
    fn bool_type(&self) -> &'static str {
        "boolean"
    }
    fn bytes_type(&self) -> &'static str {
        "Uint8Array"
    }
    fn string_type(&self) -> &'static str {
        "string"
    }
    fn array_type(&self, element: &str) -> String {
        format!("{element}[]")
    }
    fn optional_type(&self, inner: &str) -> String {
        format!("{inner} | null")
    }

    fn module_header(&self) -> String {
        "import { BitReader, BitWriter } from \"./runtime\";\n".to_string()
    }

    fn struct_def(&self, name: &str, fields: &[(String, String)], instances: &[(String, String)]) -> String {
        let mut lines: Vec<String> = fields.iter().map(|(n, t)| format!("{n}: {t};")).collect();
        for (n, t) in instances {
            lines.push(format!("{n}: {t}; // lazy, see get{}()", pascal_case(n)));
        }
        format!("export interface {name}{}\n", braced_block(&lines, "  "))
    }

    fn union_def(&self, name: &str, variants: &[(String, String)]) -> String {
        let arms: Vec<String> = variants
            .iter()
            .map(|(variant, payload)| format!("| {{ type: \"{variant}\"; value: {payload} }}"))
            .collect();
        format!("export type {name} =\n  {};\n", arms.join("\n  "))
    }

    fn comment(&self, text: &str) -> String {
        format!("// {text}")
    }
    fn block(&self, lines: &[String]) -> String {
        braced_block(lines, "  ")
    }
    fn function(&self, name: &str, params: &[(String, String)], return_type: &str, body: &[String]) -> String {
        let sig_params: Vec<String> = params.iter().map(|(n, t)| format!("{n}: {t}")).collect();
        format!("function {name}({}): {return_type}{}", sig_params.join(", "), self.block(body))
    }

    fn for_count(&self, var: &str, count_expr: &str, body: &[String]) -> String {
        format!("for (let {var} = 0; {var} < {count_expr}; {var}++){}", self.block(body))
    }
    fn while_cond(&self, cond_expr: &str, body: &[String]) -> String {
        format!("while ({cond_expr}){}", self.block(body))
    }
    fn if_chain(&self, branches: &[(String, Vec<String>)], else_body: Option<&[String]>) -> String {
        let mut out = String::new();
        for (i, (cond, body)) in branches.iter().enumerate() {
            if i > 0 {
                out.push_str(" else ");
            }
            out.push_str(&format!("if ({cond}){}", self.block(body)));
        }
        if let Some(body) = else_body {
            out.push_str(&format!(" else{}", self.block(body)));
        }
        out
    }

    fn read_int(&self, bits: u32, signed: bool, endianness: Endianness) -> String {
        format!("reader.read{}({bits}, {})", if signed { "Int" } else { "UInt" }, endian_arg(endianness))
    }
    fn write_int(&self, bits: u32, signed: bool, endianness: Endianness, value_expr: &str) -> String {
        format!(
            "writer.write{}({bits}, {}, {value_expr})",
            if signed { "Int" } else { "UInt" },
            endian_arg(endianness)
        )
    }
    fn read_bits(&self, bits: u32, signed: bool) -> String {
        format!("reader.readBits({bits}, {signed})")
    }
    fn write_bits(&self, bits: u32, signed: bool, value_expr: &str) -> String {
        format!("writer.writeBits({bits}, {signed}, {value_expr})")
    }
    fn read_varint(&self, encoding: VarlenEncoding, signed: bool) -> String {
        format!("reader.readVarint(\"{}\", {signed})", varint_arg(encoding))
    }
    fn write_varint(&self, encoding: VarlenEncoding, signed: bool, value_expr: &str) -> String {
        format!("writer.writeVarint(\"{}\", {signed}, {value_expr})", varint_arg(encoding))
    }
    fn peek_bits(&self, bits: u32) -> String {
        format!("reader.peekBits({bits})")
    }
    fn read_bytes(&self, len_expr: &str) -> String {
        format!("reader.readBytes({len_expr})")
    }
    fn write_bytes(&self, value_expr: &str) -> String {
        format!("writer.writeBytes({value_expr})")
    }

    fn decode_string(&self, bytes_expr: &str, encoding: &str) -> String {
        format!("decodeString({bytes_expr}, \"{encoding}\")")
    }
    fn encode_string(&self, value_expr: &str, encoding: &str) -> String {
        format!("encodeString({value_expr}, \"{encoding}\")")
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
        format!("const {name} = {value_expr};")
    }
    fn mutable_let_binding(&self, name: &str, value_expr: &str) -> String {
        format!("let {name} = {value_expr};")
    }
    fn assign(&self, target_expr: &str, value_expr: &str) -> String {
        format!("{target_expr} = {value_expr};")
    }
    fn field_access(&self, base: &str, field: &str) -> String {
        format!("{base}.{field}")
    }
    fn return_stmt(&self, expr: &str) -> String {
        format!("return {expr};")
    }
    fn push_stmt(&self, array_expr: &str, value_expr: &str) -> String {
        format!("{array_expr}.push({value_expr});")
    }
    fn break_stmt(&self) -> String {
        "break;".to_string()
    }
    fn empty_array_literal(&self) -> String {
        "[]".to_string()
    }
    fn none_literal(&self) -> String {
        "null".to_string()
    }

    fn reader_position(&self) -> String {
        "reader.bytePosition()".to_string()
    }
    fn reader_at_eof(&self) -> String {
        "reader.atEof()".to_string()
    }
    fn reader_seek(&self, pos_expr: &str) -> String {
        format!("reader.seek({pos_expr});")
    }

    fn writer_position(&self) -> String {
        "writer.bytePosition()".to_string()
    }
    fn writer_seek(&self, pos_expr: &str) -> String {
        format!("writer.seek({pos_expr});")
    }

    fn raise_error(&self, message_expr: &str) -> String {
        format!("throw new Error({message_expr});")
    }

    fn decode_return_type(&self, type_name: &str) -> String {
        type_name.to_string()
    }
    fn encode_return_type(&self) -> String {
        "void".to_string()
    }
    fn reader_param_type(&self) -> String {
        "BitReader".to_string()
    }
    fn writer_param_type(&self) -> String {
        "BitWriter".to_string()
    }

    fn struct_literal(&self, _type_name: &str, fields: &[String]) -> String {
        format!("{{ {} }}", fields.join(", "))
    }
    fn union_literal(&self, _type_name: &str, variant: &str, value_expr: &str) -> String {
        format!("{{ type: \"{variant}\", value: {value_expr} }}")
    }
}

fn endian_arg(e: Endianness) -> &'static str {
    match e {
        Endianness::Big => "\"be\"",
        Endianness::Little => "\"le\"",
    }
}

fn varint_arg(v: VarlenEncoding) -> &'static str {
    match v {
        VarlenEncoding::Der => "der",
        VarlenEncoding::Leb128 => "leb128",
        VarlenEncoding::Ebml => "ebml",
        VarlenEncoding::Vlq => "vlq",
    }
}

/// Shared by TypeScript and Rust: both use C-family infix operators.
pub(crate) fn binop_c_family(op: BinOp) -> &'static str {
    match op {
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
    }
}

pub(crate) fn unop_c_family(op: UnOp) -> &'static str {
    match op {
        UnOp::Not => "!",
        UnOp::Neg => "-",
        UnOp::BitNot => "~",
    }
}

pub(crate) fn literal_c_family(lit: &Literal) -> String {
    match lit {
        Literal::Int(i) => i.to_string(),
        Literal::Str(s) => format!("{s:?}"),
        Literal::Bool(b) => b.to_string(),
    }
}

/// Renders a path as `current.a.b`, or `root.a.b` when the path's first
/// segment is `_root` — the same root/current split `StructEnv` resolves at
/// decode time, just rendered as source text instead of evaluated.
pub(crate) fn path_expr_dotted(emitter: &dyn Emitter, path: &Path) -> String {
    let is_root = path.is_root();
    let segments: Vec<&str> = if is_root { path.0.iter().skip(1).map(String::as_str).collect() } else { path.0.iter().map(String::as_str).collect() };
    let base = if is_root { "root" } else { "current" };
    let mut expr = base.to_string();
    for seg in segments {
        expr = emitter.field_access(&expr, &emitter.field_ident(seg));
    }
    expr
}
