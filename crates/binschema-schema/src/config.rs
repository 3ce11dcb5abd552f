//! Schema-wide defaults. Replaces the old per-workspace `assembly.rs`
//! `Assemble`/`BitOrder` pair: `Assemble` (fragment concat direction) has no
//! counterpart in this model, but `BitOrder` itself is kept — it now lives in
//! `binschema-codec` since it's a codec-level concept, and `Config` just
//! carries the schema's chosen default.

use binschema_codec::{BitOrder, Endianness};

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub endianness: Endianness,
    pub bit_order: BitOrder,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endianness: Endianness::Big,
            bit_order: BitOrder::MsbFirst,
        }
    }
}
