use alloc::vec::Vec;

use log::trace;

use super::{
    Tag, Varint, WireType, Width, length_prefixed_skip, submessage, varint::discard, zigzag32,
    zigzag64,
};
use crate::{
    callback::{Callback, Context, Next, Step},
    combinators::{Skip, fixed_le_u32, fixed_le_u64},
    error::{ErrorSource, ScopeError, SyntaxError},
    scope::{Handle, NodeId, Scope, ScopeId},
};

#[derive(Debug, Clone, Copy)]
struct Field {
    number: u32,
    wire_type: WireType,
    decoder: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Tag,
    Field(NodeId),
}

/// Unknown-field skippers, one per skippable wire type.
#[derive(Debug, Clone, Copy)]
struct Skippers {
    varint: NodeId,
    fixed64: NodeId,
    length_delimited: NodeId,
    fixed32: NodeId,
}

/// Decodes a sequence of fields until the stream (or the enclosing
/// length-delimited body) ends.
///
/// Each tag is looked up in the field table and the matching decoder runs
/// on the bytes that follow. Fields without a decoder are skipped. A known
/// field arriving with the wrong wire type is an error, as are groups.
/// The message never completes on its own; ending is accepted only between
/// fields.
///
/// All decoders live in one tuple owned by the message node.
pub struct Message {
    tag: NodeId,
    skippers: Skippers,
    /// Sorted by field number.
    fields: Vec<Field>,
    phase: Phase,
}

impl Message {
    fn dispatch(&self, tag: Tag) -> Result<NodeId, ErrorSource> {
        if let Ok(index) = self.fields.binary_search_by_key(&tag.field, |f| f.number) {
            let field = &self.fields[index];
            if field.wire_type != tag.wire_type {
                return Err(SyntaxError::UnexpectedWireType {
                    field: tag.field,
                    expected: field.wire_type,
                    actual: tag.wire_type,
                }
                .into());
            }
            trace!("message: dispatching field {}", tag.field);
            return Ok(field.decoder);
        }

        trace!("message: skipping unknown field {} ({:?})", tag.field, tag.wire_type);
        match tag.wire_type {
            WireType::Varint => Ok(self.skippers.varint),
            WireType::Fixed64 => Ok(self.skippers.fixed64),
            WireType::LengthDelimited => Ok(self.skippers.length_delimited),
            WireType::Fixed32 => Ok(self.skippers.fixed32),
            other @ (WireType::StartGroup | WireType::EndGroup) => {
                Err(SyntaxError::UnsupportedWireType(other).into())
            }
        }
    }
}

impl<T> Callback<T> for Message {
    fn activate(&mut self, cx: &mut Context<'_, T>, _input: Option<u64>) -> Result<(), ErrorSource> {
        self.phase = Phase::Tag;
        cx.activate(self.tag, None)
    }

    fn process(&mut self, cx: &mut Context<'_, T>, mut buf: &[u8]) -> Result<Step, ErrorSource> {
        loop {
            let node = match self.phase {
                Phase::Tag if buf.is_empty() => return Ok(Step::Incomplete),
                Phase::Tag => self.tag,
                Phase::Field(decoder) => decoder,
            };
            let nested = cx.process(node, buf)?;
            let Step::Done { unconsumed } = nested.step else {
                return Ok(Step::Incomplete);
            };
            let start = buf
                .len()
                .checked_sub(unconsumed)
                .ok_or(ErrorSource::InvalidRemainder {
                    unconsumed,
                    available: buf.len(),
                })?;
            buf = &buf[start..];

            match self.phase {
                Phase::Tag => {
                    let raw = nested
                        .hand_off
                        .ok_or(SyntaxError::SyntaxError("tag decoder produced no value"))?;
                    let decoder = self.dispatch(Tag::from_raw(raw)?)?;
                    cx.activate(decoder, None)?;
                    self.phase = Phase::Field(decoder);
                }
                Phase::Field(_) => {
                    cx.activate(self.tag, None)?;
                    self.phase = Phase::Tag;
                }
            }
        }
    }

    fn close(&mut self, cx: &mut Context<'_, T>) -> Result<(), ErrorSource> {
        match self.phase {
            Phase::Tag => cx.close(self.tag),
            Phase::Field(_) => Err(SyntaxError::UnexpectedEndOfInput.into()),
        }
    }
}

/// Assembles a [`Message`] node field by field.
///
/// Decoders are parked in a staging group until [`build`](Self::build)
/// moves them into the message. Dropping the builder without building frees
/// everything it allocated. Registering the same field number twice
/// replaces the earlier decoder.
pub struct MessageBuilder<'s, T> {
    scope: &'s mut Scope<T>,
    parent: Handle,
    staging: ScopeId,
    fields: Vec<Field>,
    built: bool,
}

impl<'s, T: 'static> MessageBuilder<'s, T> {
    pub fn new(scope: &'s mut Scope<T>, parent: impl Into<Handle>) -> Result<Self, ScopeError> {
        let parent = parent.into();
        let staging = scope.group(parent)?;
        Ok(Self {
            scope,
            parent,
            staging,
            fields: Vec::new(),
            built: false,
        })
    }

    /// Where decoders for this message should be allocated before they are
    /// registered with [`field`](Self::field).
    pub fn staging(&self) -> ScopeId {
        self.staging
    }

    /// The arena the message is being built in, for allocating custom
    /// decoders under [`staging`](Self::staging).
    pub fn scope(&mut self) -> &mut Scope<T> {
        &mut *self.scope
    }

    /// Registers `decoder` for field `number`. The decoder is activated after
    /// each matching tag and must complete at the end of the field's value.
    pub fn field(
        &mut self,
        number: u32,
        wire_type: WireType,
        decoder: NodeId,
    ) -> Result<&mut Self, ErrorSource> {
        Tag::new(number, wire_type)?;
        if matches!(wire_type, WireType::StartGroup | WireType::EndGroup) {
            return Err(SyntaxError::UnsupportedWireType(wire_type).into());
        }
        self.scope.steal(self.staging, decoder)?;
        let field = Field {
            number,
            wire_type,
            decoder,
        };
        match self.fields.binary_search_by_key(&number, |f| f.number) {
            Ok(index) => self.fields[index] = field,
            Err(index) => {
                self.fields.try_reserve(1).map_err(ScopeError::from)?;
                self.fields.insert(index, field);
            }
        }
        Ok(self)
    }

    fn varint_field(
        &mut self,
        number: u32,
        width: Width,
        sink: impl FnMut(&mut T, u64) -> Result<(), SyntaxError> + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        let decoder = self.scope.insert(self.staging, Varint::new(width, sink))?;
        self.field(number, WireType::Varint, decoder)
    }

    pub fn uint32(
        &mut self,
        number: u32,
        mut sink: impl FnMut(&mut T, u32) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        self.varint_field(number, Width::U32, move |out: &mut T, value: u64| {
            sink(out, narrow(value)?);
            Ok(())
        })
    }

    pub fn uint64(
        &mut self,
        number: u32,
        mut sink: impl FnMut(&mut T, u64) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        self.varint_field(number, Width::U64, move |out: &mut T, value: u64| {
            sink(out, value);
            Ok(())
        })
    }

    /// Zig-zag encoded signed 32-bit field.
    pub fn sint32(
        &mut self,
        number: u32,
        mut sink: impl FnMut(&mut T, i32) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        self.varint_field(number, Width::U32, move |out: &mut T, value: u64| {
            sink(out, zigzag32(narrow(value)?));
            Ok(())
        })
    }

    /// Zig-zag encoded signed 64-bit field.
    pub fn sint64(
        &mut self,
        number: u32,
        mut sink: impl FnMut(&mut T, i64) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        self.varint_field(number, Width::U64, move |out: &mut T, value: u64| {
            sink(out, zigzag64(value));
            Ok(())
        })
    }

    pub fn bool(
        &mut self,
        number: u32,
        mut sink: impl FnMut(&mut T, bool) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        self.varint_field(number, Width::U64, move |out: &mut T, value: u64| {
            sink(out, value != 0);
            Ok(())
        })
    }

    pub fn fixed32(
        &mut self,
        number: u32,
        sink: impl FnMut(&mut T, u32) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        let decoder = fixed_le_u32(self.scope, self.staging, sink, Next::Finish)?;
        self.field(number, WireType::Fixed32, decoder)
    }

    pub fn fixed64(
        &mut self,
        number: u32,
        sink: impl FnMut(&mut T, u64) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        let decoder = fixed_le_u64(self.scope, self.staging, sink, Next::Finish)?;
        self.field(number, WireType::Fixed64, decoder)
    }

    /// Length-delimited field delivered whole to `sink`.
    pub fn bytes(
        &mut self,
        number: u32,
        sink: impl FnMut(&mut T, &[u8]) + 'static,
    ) -> Result<&mut Self, ErrorSource> {
        let decoder = super::bytes_field(self.scope, self.staging, sink, Next::Finish)?;
        self.field(number, WireType::LengthDelimited, decoder)
    }

    /// Nested message field. `build` receives a fresh builder for the inner
    /// message; its decoders write into the same output value.
    pub fn message(
        &mut self,
        number: u32,
        build: impl FnOnce(&mut MessageBuilder<'_, T>) -> Result<(), ErrorSource>,
    ) -> Result<&mut Self, ErrorSource> {
        let mut inner = MessageBuilder::new(self.scope, self.staging)?;
        build(&mut inner)?;
        let inner = inner.build()?;
        let decoder = submessage(self.scope, self.staging, inner, Next::Finish)?;
        self.field(number, WireType::LengthDelimited, decoder)
    }

    /// Creates the message node under the builder's parent.
    pub fn build(mut self) -> Result<NodeId, ErrorSource> {
        let scope = &mut *self.scope;
        let staging = self.staging;

        let tag = scope.insert(staging, Varint::new(Width::U32, discard::<T>).allow_eof(true))?;
        let skippers = Skippers {
            varint: scope.insert(staging, Varint::new(Width::U64, discard::<T>))?,
            fixed64: scope.insert(staging, Skip::new(8))?,
            length_delimited: length_prefixed_skip(scope, staging, Next::Finish)?,
            fixed32: scope.insert(staging, Skip::new(4))?,
        };

        let mut members = Vec::new();
        members.try_reserve_exact(5 + self.fields.len()).map_err(ScopeError::from)?;
        members.extend([
            tag,
            skippers.varint,
            skippers.fixed64,
            skippers.length_delimited,
            skippers.fixed32,
        ]);
        members.extend(self.fields.iter().map(|field| field.decoder));

        let part_count = members.len();
        let parts = scope.tuple_new(staging, part_count)?;
        for (index, member) in members.into_iter().enumerate() {
            scope.tuple_set(parts, index, member)?;
        }

        let message = Message {
            tag,
            skippers,
            fields: core::mem::take(&mut self.fields),
            phase: Phase::Tag,
        };
        let node = scope.insert(self.parent, message)?;
        let stolen = scope.steal(node, parts);
        crate::combinators::or_free(scope, node, stolen)?;

        // Whatever is left in staging was replaced and is no longer used.
        scope.free(staging)?;
        self.built = true;
        trace!("message: built with {part_count} parts");
        Ok(node)
    }
}

impl<T> Drop for MessageBuilder<'_, T> {
    fn drop(&mut self) {
        if !self.built {
            let _ = self.scope.free(self.staging);
        }
    }
}

fn narrow(value: u64) -> Result<u32, SyntaxError> {
    u32::try_from(value).map_err(|_| SyntaxError::VarintOverflow(32))
}
