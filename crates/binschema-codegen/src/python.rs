//! Python emitter: the scripting target. Value shapes lower to `@dataclass`
//! definitions with type hints, blocks are indentation rather than braces,
//! and reads/writes go through a small `BitReader`/`BitWriter` runtime
//! module that raises on failure instead of returning a `Result`.

use binschema_codec::{Endianness, VarlenEncoding};
use binschema_expr::{BinOp, Literal, Path, UnOp};

use crate::casing::{pascal_case, snake_case};
use crate::emitter::{Emitter, Target};
use crate::text::colon_block;
use crate::typescript::{path_expr_dotted, unop_c_family};

pub struct PythonEmitter;

impl Emitter for PythonEmitter {
    fn target(&self) -> Target {
        Target::Python
    }
    fn file_extension(&self) -> &'static str {
        "py"
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
        let _ = (bits, signed);
        "int".to_string()
    }
    fn bool_type(&self) -> &'static str {
        "bool"
    }
    fn bytes_type(&self) -> &'static str {
        "bytes"
    }
    fn string_type(&self) -> &'static str {
        "str"
    }
    fn array_type(&self, element: &str) -> String {
        format!("List[{element}]")
    }
    fn optional_type(&self, inner: &str) -> String {
        format!("Optional[{inner}]")
    }

    fn module_header(&self) -> String {
        "from dataclasses import dataclass\nfrom typing import List, Optional, Union\n\nfrom .runtime import BitReader, BitWriter\n".to_string()
    }

    fn struct_def(&self, name: &str, fields: &[(String, String)], instances: &[(String, String)]) -> String {
        let mut lines: Vec<String> = fields.iter().map(|(n, t)| format!("{n}: {t}")).collect();
        for (n, t) in instances {
            lines.push(format!("{n}: {t}  # lazy, see get_{n}()"));
        }
        if lines.is_empty() {
            lines.push("pass".to_string());
        }
        format!("@dataclass\nclass {name}{}\n", colon_block(&lines, "    "))
    }

    fn union_def(&self, name: &str, variants: &[(String, String)]) -> String {
        let payloads: Vec<String> = variants.iter().map(|(_, payload)| payload.clone()).collect();
        format!("{name} = Union[{}]\n", payloads.join(", "))
    }

    fn comment(&self, text: &str) -> String {
        format!("# {text}")
    }
    fn block(&self, lines: &[String]) -> String {
        colon_block(lines, "    ")
    }
    fn function(&self, name: &str, params: &[(String, String)], return_type: &str, body: &[String]) -> String {
        let sig_params: Vec<String> = params.iter().map(|(n, t)| format!("{n}: {t}")).collect();
        format!("def {name}({}) -> {return_type}{}", sig_params.join(", "), self.block(body))
    }

    fn for_count(&self, var: &str, count_expr: &str, body: &[String]) -> String {
        format!("for {var} in range({count_expr}){}", self.block(body))
    }
    fn while_cond(&self, cond_expr: &str, body: &[String]) -> String {
        format!("while {cond_expr}{}", self.block(body))
    }
    fn if_chain(&self, branches: &[(String, Vec<String>)], else_body: Option<&[String]>) -> String {
        let mut out = String::new();
        for (i, (cond, body)) in branches.iter().enumerate() {
            let keyword = if i == 0 { "if" } else { "elif" };
            out.push_str(&format!("{keyword} {cond}{}\n", self.block(body)));
        }
        if let Some(body) = else_body {
            out.push_str(&format!("else{}", self.block(body)));
        } else if let Some(stripped) = out.strip_suffix('\n') {
            out = stripped.to_string();
        }
        out
    }

    fn read_int(&self, bits: u32, signed: bool, endianness: Endianness) -> String {
        format!("reader.read_int({bits}, {}, \"{}\")", py_bool(signed), endian_arg(endianness))
    }
    fn write_int(&self, bits: u32, signed: bool, endianness: Endianness, value_expr: &str) -> String {
        format!("writer.write_int({bits}, {}, \"{}\", {value_expr})", py_bool(signed), endian_arg(endianness))
    }
    fn read_bits(&self, bits: u32, signed: bool) -> String {
        format!("reader.read_bits({bits}, {})", py_bool(signed))
    }
    fn write_bits(&self, bits: u32, signed: bool, value_expr: &str) -> String {
        format!("writer.write_bits({bits}, {}, {value_expr})", py_bool(signed))
    }
    fn read_varint(&self, encoding: VarlenEncoding, signed: bool) -> String {
        format!("reader.read_varint(\"{}\", {})", varint_arg(encoding), py_bool(signed))
    }
    fn write_varint(&self, encoding: VarlenEncoding, signed: bool, value_expr: &str) -> String {
        format!("writer.write_varint(\"{}\", {}, {value_expr})", varint_arg(encoding), py_bool(signed))
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

    fn decode_string(&self, bytes_expr: &str, encoding: &str) -> String {
        format!("decode_string({bytes_expr}, \"{encoding}\")")
    }
    fn encode_string(&self, value_expr: &str, encoding: &str) -> String {
        format!("encode_string({value_expr}, \"{encoding}\")")
    }

    fn binop_token(&self, op: BinOp) -> &'static str {
        match op {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "//",
            BinOp::Rem => "%",
        }
    }
    fn unop_token(&self, op: UnOp) -> &'static str {
        match op {
            UnOp::Not => "not ",
            _ => unop_c_family(op),
        }
    }
    fn literal(&self, lit: &Literal) -> String {
        match lit {
            Literal::Int(i) => i.to_string(),
            Literal::Str(s) => format!("{s:?}"),
            Literal::Bool(b) => py_bool(*b).to_string(),
        }
    }
    fn path_expr(&self, path: &Path) -> String {
        path_expr_dotted(self, path)
    }

    fn let_binding(&self, name: &str, value_expr: &str) -> String {
        format!("{name} = {value_expr}")
    }
    fn mutable_let_binding(&self, name: &str, value_expr: &str) -> String {
        format!("{name} = {value_expr}")
    }
    fn assign(&self, target_expr: &str, value_expr: &str) -> String {
        format!("{target_expr} = {value_expr}")
    }
    fn field_access(&self, base: &str, field: &str) -> String {
        format!("{base}.{field}")
    }
    fn return_stmt(&self, expr: &str) -> String {
        format!("return {expr}")
    }
    fn push_stmt(&self, array_expr: &str, value_expr: &str) -> String {
        format!("{array_expr}.append({value_expr})")
    }
    fn break_stmt(&self) -> String {
        "break".to_string()
    }
    fn empty_array_literal(&self) -> String {
        "[]".to_string()
    }
    fn none_literal(&self) -> String {
        "None".to_string()
    }

    fn reader_position(&self) -> String {
        "reader.byte_position()".to_string()
    }
    fn reader_at_eof(&self) -> String {
        "reader.at_eof()".to_string()
    }
    fn reader_seek(&self, pos_expr: &str) -> String {
        format!("reader.seek({pos_expr})")
    }

    fn writer_position(&self) -> String {
        "writer.byte_position()".to_string()
    }
    fn writer_seek(&self, pos_expr: &str) -> String {
        format!("writer.seek({pos_expr})")
    }

    fn raise_error(&self, message_expr: &str) -> String {
        format!("raise ValueError({message_expr})")
    }

    fn decode_return_type(&self, type_name: &str) -> String {
        type_name.to_string()
    }
    fn encode_return_type(&self) -> String {
        "None".to_string()
    }
    fn reader_param_type(&self) -> String {
        "BitReader".to_string()
    }
    fn writer_param_type(&self) -> String {
        "BitWriter".to_string()
    }

    fn struct_literal(&self, type_name: &str, fields: &[String]) -> String {
        let args: Vec<String> = fields.iter().map(|f| format!("{f}={f}")).collect();
        format!("{type_name}({})", args.join(", "))
    }
    fn union_literal(&self, _type_name: &str, _variant: &str, value_expr: &str) -> String {
        value_expr.to_string()
    }
}

fn py_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn endian_arg(e: Endianness) -> &'static str {
    match e {
        Endianness::Big => "be",
        Endianness::Little => "le",
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
