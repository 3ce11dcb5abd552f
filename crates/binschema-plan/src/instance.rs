//! Lazy, memoized instance accessors.
//!
//! A sequence's fields are read eagerly in order, so an instance's
//! `position`/`size` (which may reference an earlier sibling field) is
//! always resolvable by the time the instance is reached. What's genuinely
//! lazy is *decoding the target*: that only happens the first time something
//! calls [`InstanceCell::get`].

use std::cell::RefCell;
use std::rc::Rc;

use binschema_schema::{FieldKind, Schema};

use crate::errors::PlanError;
use crate::value::Value;

#[derive(Debug, Clone, Default)]
enum InstanceState {
    #[default]
    Unevaluated,
    Evaluating,
    Evaluated(Value),
    Error(String),
    Skipped,
}

pub struct InstanceCell {
    schema: Rc<Schema>,
    bytes: Rc<Vec<u8>>,
    target: FieldKind,
    position: u64,
    size: Option<u64>,
    state: RefCell<InstanceState>,
}

impl InstanceCell {
    pub fn new(schema: Rc<Schema>, bytes: Rc<Vec<u8>>, target: FieldKind, position: u64, size: Option<u64>) -> Self {
        InstanceCell {
            schema,
            bytes,
            target,
            position,
            size,
            state: RefCell::new(InstanceState::Unevaluated),
        }
    }

    pub fn skipped(schema: Rc<Schema>, bytes: Rc<Vec<u8>>, target: FieldKind) -> Self {
        InstanceCell {
            schema,
            bytes,
            target,
            position: 0,
            size: None,
            state: RefCell::new(InstanceState::Skipped),
        }
    }

    /// Resolves the target value, decoding it on first call and returning
    /// the memoized result on every subsequent call. A call made while this
    /// same cell is already mid-evaluation (only possible if the target
    /// somehow points back at itself) is a circular reference error.
    pub fn get(&self, name: &str) -> Result<Value, PlanError> {
        {
            let state = self.state.borrow();
            match &*state {
                InstanceState::Evaluated(v) => return Ok(v.clone()),
                InstanceState::Error(msg) => return Err(PlanError::UnresolvedPath(msg.clone())),
                InstanceState::Skipped => return Err(PlanError::InstanceSkipped(name.to_string())),
                InstanceState::Evaluating => return Err(PlanError::CircularInstance(name.to_string())),
                InstanceState::Unevaluated => {}
            }
        }

        *self.state.borrow_mut() = InstanceState::Evaluating;

        let result = self.evaluate();

        *self.state.borrow_mut() = match &result {
            Ok(v) => InstanceState::Evaluated(v.clone()),
            Err(e) => InstanceState::Error(e.to_string()),
        };

        result
    }

    fn evaluate(&self) -> Result<Value, PlanError> {
        let window: &[u8] = match self.size {
            Some(size) => {
                let end = (self.position + size) as usize;
                self.bytes
                    .get(self.position as usize..end)
                    .ok_or(PlanError::Read(
                        self.position,
                        binschema_codec::ReadError::SeekOutOfBounds {
                            position: self.position,
                            len: self.bytes.len() as u64,
                        },
                    ))?
            }
            None => self
                .bytes
                .get(self.position as usize..)
                .ok_or(PlanError::Read(
                    self.position,
                    binschema_codec::ReadError::SeekOutOfBounds {
                        position: self.position,
                        len: self.bytes.len() as u64,
                    },
                ))?,
        };

        let mut reader = binschema_codec::Reader::from_buffer(window.to_vec());
        crate::decode::decode_standalone(&self.schema, &self.bytes, &self.target, &mut reader)
    }

    pub fn is_evaluated(&self) -> bool {
        matches!(&*self.state.borrow(), InstanceState::Evaluated(_))
    }
}

impl std::fmt::Debug for InstanceCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstanceCell {{ position: {}, state: {:?} }}", self.position, self.state.borrow())
    }
}
