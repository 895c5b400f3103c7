//! Schema registry: compiled, read-only message descriptors.
//!
//! Message definitions are plain static tables (`MessageDef`). `SchemaRegistry::compile`
//! resolves message references by full name, assigns JSON names and indexes fields by
//! number and by name. The result is immutable and shared between threads.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{OtelGateError, Result};
use crate::signal::Signal;

use prost::encoding::{WireType, MAX_TAG};

use super::otlp;

/// Protobuf scalar value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    pub fn wire_type(self) -> WireType {
        match self {
            ScalarKind::Int32
            | ScalarKind::Int64
            | ScalarKind::Uint32
            | ScalarKind::Uint64
            | ScalarKind::Sint32
            | ScalarKind::Sint64
            | ScalarKind::Bool => WireType::Varint,
            ScalarKind::Double | ScalarKind::Fixed64 | ScalarKind::Sfixed64 => WireType::SixtyFourBit,
            ScalarKind::Float | ScalarKind::Fixed32 | ScalarKind::Sfixed32 => WireType::ThirtyTwoBit,
            ScalarKind::String | ScalarKind::Bytes => WireType::LengthDelimited,
        }
    }

    /// Numeric scalars may be sent packed when repeated.
    pub fn is_packable(self) -> bool {
        !matches!(self, ScalarKind::String | ScalarKind::Bytes)
    }

    /// 64-bit integers are rendered as decimal strings in canonical objects.
    pub fn is_64bit_integer(self) -> bool {
        matches!(
            self,
            ScalarKind::Int64
                | ScalarKind::Uint64
                | ScalarKind::Sint64
                | ScalarKind::Fixed64
                | ScalarKind::Sfixed64
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Singular,
    Repeated,
}

/// Field type as written in a definition table.
#[derive(Debug, Clone, Copy)]
pub enum FieldType {
    Scalar(ScalarKind),
    Enum,
    Message(&'static str),
}

/// One field of a static message definition.
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub number: u32,
    pub name: &'static str,
    pub ty: FieldType,
    pub cardinality: Cardinality,
    pub oneof: Option<&'static str>,
}

impl FieldDef {
    pub const fn scalar(number: u32, name: &'static str, kind: ScalarKind) -> Self {
        Self {
            number,
            name,
            ty: FieldType::Scalar(kind),
            cardinality: Cardinality::Singular,
            oneof: None,
        }
    }

    pub const fn enumeration(number: u32, name: &'static str) -> Self {
        Self {
            number,
            name,
            ty: FieldType::Enum,
            cardinality: Cardinality::Singular,
            oneof: None,
        }
    }

    pub const fn message(number: u32, name: &'static str, type_name: &'static str) -> Self {
        Self {
            number,
            name,
            ty: FieldType::Message(type_name),
            cardinality: Cardinality::Singular,
            oneof: None,
        }
    }

    pub const fn repeated(self) -> Self {
        Self {
            cardinality: Cardinality::Repeated,
            ..self
        }
    }

    pub const fn in_oneof(self, group: &'static str) -> Self {
        Self {
            oneof: Some(group),
            ..self
        }
    }
}

/// Static message definition.
#[derive(Debug, Clone, Copy)]
pub struct MessageDef {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

/// Index of a compiled message inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(usize);

/// Compiled field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    Enum,
    Message(MessageId),
}

impl FieldKind {
    pub fn wire_type(self) -> WireType {
        match self {
            FieldKind::Scalar(kind) => kind.wire_type(),
            FieldKind::Enum => WireType::Varint,
            FieldKind::Message(_) => WireType::LengthDelimited,
        }
    }

    pub fn is_packable(self) -> bool {
        match self {
            FieldKind::Scalar(kind) => kind.is_packable(),
            FieldKind::Enum => true,
            FieldKind::Message(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub number: u32,
    pub name: &'static str,
    pub json_name: String,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    /// Index into the owning message's oneof groups.
    pub oneof: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    full_name: &'static str,
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<&'static str>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
}

impl MessageDescriptor {
    pub fn full_name(&self) -> &'static str {
        self.full_name
    }

    /// Fields ordered by field number.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).and_then(|&i| self.fields.get(i))
    }

    /// Lookup by JSON (lowerCamelCase) or proto (snake_case) name.
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).and_then(|&i| self.fields.get(i))
    }

    pub fn oneof_name(&self, index: usize) -> Option<&'static str> {
        self.oneofs.get(index).copied()
    }

    /// Other members of the oneof group `field` belongs to.
    pub fn oneof_siblings<'a>(
        &'a self,
        field: &'a FieldDescriptor,
    ) -> impl Iterator<Item = &'a FieldDescriptor> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.oneof.is_some() && f.oneof == field.oneof && f.number != field.number)
    }
}

/// Compiled schema. Immutable after `compile`.
#[derive(Debug)]
pub struct SchemaRegistry {
    messages: Vec<MessageDescriptor>,
    by_name: HashMap<&'static str, MessageId>,
}

impl SchemaRegistry {
    /// Compile a set of message definitions.
    pub fn compile(defs: &[MessageDef]) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(defs.len());
        for (i, def) in defs.iter().enumerate() {
            if by_name.insert(def.name, MessageId(i)).is_some() {
                return Err(OtelGateError::Internal(format!(
                    "duplicate message definition: {}",
                    def.name
                )));
            }
        }

        let mut messages = Vec::with_capacity(defs.len());
        for def in defs {
            messages.push(compile_message(def, &by_name)?);
        }

        Ok(Self { messages, by_name })
    }

    /// Compile the OTLP v1 schema.
    pub fn otlp_v1() -> Result<Self> {
        Self::compile(otlp::MESSAGES)
    }

    /// Process-wide OTLP v1 registry, compiled on first use.
    pub fn shared() -> Result<Arc<SchemaRegistry>> {
        static SHARED: OnceLock<std::result::Result<Arc<SchemaRegistry>, String>> = OnceLock::new();
        SHARED
            .get_or_init(|| {
                let registry = SchemaRegistry::otlp_v1().map_err(|e| e.to_string())?;
                tracing::debug!(messages = registry.len(), "otlp schema registry compiled");
                Ok(Arc::new(registry))
            })
            .clone()
            .map_err(OtelGateError::Internal)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn lookup(&self, full_name: &str) -> Option<MessageId> {
        self.by_name.get(full_name).copied()
    }

    /// Root request message for a signal.
    pub fn root(&self, signal: Signal) -> Result<MessageId> {
        self.lookup(signal.root_message()).ok_or_else(|| {
            OtelGateError::Internal(format!("schema has no root message for {signal}"))
        })
    }

    /// Ids from another registry are reported, not trusted.
    pub fn message(&self, id: MessageId) -> Result<&MessageDescriptor> {
        self.messages
            .get(id.0)
            .ok_or_else(|| OtelGateError::Internal(format!("unknown message id {}", id.0)))
    }
}

fn compile_message(
    def: &MessageDef,
    by_name: &HashMap<&'static str, MessageId>,
) -> Result<MessageDescriptor> {
    let mut fields = Vec::with_capacity(def.fields.len());
    let mut oneofs: Vec<&'static str> = Vec::new();

    for f in def.fields {
        let kind = match f.ty {
            FieldType::Scalar(kind) => FieldKind::Scalar(kind),
            FieldType::Enum => FieldKind::Enum,
            FieldType::Message(name) => FieldKind::Message(*by_name.get(name).ok_or_else(|| {
                OtelGateError::Internal(format!(
                    "{}.{} references unknown message {name}",
                    def.name, f.name
                ))
            })?),
        };

        let oneof = match f.oneof {
            Some(group) => {
                if f.cardinality == Cardinality::Repeated {
                    return Err(OtelGateError::Internal(format!(
                        "{}.{}: repeated fields cannot be oneof members",
                        def.name, f.name
                    )));
                }
                Some(match oneofs.iter().position(|g| *g == group) {
                    Some(i) => i,
                    None => {
                        oneofs.push(group);
                        oneofs.len() - 1
                    }
                })
            }
            None => None,
        };

        if f.number == 0 || f.number > MAX_TAG {
            return Err(OtelGateError::Internal(format!(
                "{}.{}: invalid field number {}",
                def.name, f.name, f.number
            )));
        }

        fields.push(FieldDescriptor {
            number: f.number,
            name: f.name,
            json_name: lower_camel(f.name),
            kind,
            cardinality: f.cardinality,
            oneof,
        });
    }

    fields.sort_by_key(|f| f.number);

    let mut by_number = HashMap::with_capacity(fields.len());
    let mut by_field_name = HashMap::with_capacity(fields.len() * 2);
    for (i, f) in fields.iter().enumerate() {
        if by_number.insert(f.number, i).is_some() {
            return Err(OtelGateError::Internal(format!(
                "{}: duplicate field number {}",
                def.name, f.number
            )));
        }
        if by_field_name.insert(f.json_name.clone(), i).is_some() {
            return Err(OtelGateError::Internal(format!(
                "{}: duplicate field name {}",
                def.name, f.json_name
            )));
        }
        by_field_name.entry(f.name.to_string()).or_insert(i);
    }

    Ok(MessageDescriptor {
        full_name: def.name,
        fields,
        oneofs,
        by_number,
        by_name: by_field_name,
    })
}

/// `start_time_unix_nano` -> `startTimeUnixNano`.
pub fn lower_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const INNER: &str = "test.Inner";

    #[test]
    fn lower_camel_follows_protoc() {
        assert_eq!(lower_camel("start_time_unix_nano"), "startTimeUnixNano");
        assert_eq!(lower_camel("kvlist_value"), "kvlistValue");
        assert_eq!(lower_camel("name"), "name");
    }

    #[test]
    fn unresolved_reference_fails_compile() {
        let defs = [MessageDef {
            name: "test.Outer",
            fields: const { &[FieldDef::message(1, "inner", INNER)] },
        }];
        assert!(SchemaRegistry::compile(&defs).is_err());
    }

    #[test]
    fn duplicate_field_number_fails_compile() {
        let defs = [MessageDef {
            name: INNER,
            fields: const { &[
                FieldDef::scalar(1, "a", ScalarKind::String),
                FieldDef::scalar(1, "b", ScalarKind::String),
            ] },
        }];
        assert!(SchemaRegistry::compile(&defs).is_err());
    }

    #[test]
    fn oneof_groups_are_indexed() {
        let defs = [MessageDef {
            name: INNER,
            fields: const { &[
                FieldDef::scalar(1, "a", ScalarKind::String).in_oneof("v"),
                FieldDef::scalar(2, "b", ScalarKind::Int64).in_oneof("v"),
                FieldDef::scalar(3, "c", ScalarKind::Bool),
            ] },
        }];
        let registry = SchemaRegistry::compile(&defs).unwrap();
        let msg = registry.message(registry.lookup(INNER).unwrap()).unwrap();

        assert_eq!(msg.field_by_name("a").unwrap().oneof, Some(0));
        assert_eq!(msg.oneof_name(0), Some("v"));
        let a = msg.field_by_number(1).unwrap();
        let siblings: Vec<u32> = msg.oneof_siblings(a).map(|s| s.number).collect();
        assert_eq!(siblings, vec![2]);
        assert_eq!(msg.field_by_name("c").unwrap().oneof, None);
    }

    #[test]
    fn otlp_roots_resolve() {
        let registry = SchemaRegistry::shared().unwrap();
        for signal in Signal::ALL {
            let root = registry.root(signal).unwrap();
            assert_eq!(registry.message(root).unwrap().full_name(), signal.root_message());
        }
    }

    #[test]
    fn foreign_message_id_is_an_error() {
        let small = SchemaRegistry::compile(&[MessageDef {
            name: INNER,
            fields: const { &[FieldDef::scalar(1, "a", ScalarKind::String)] },
        }])
        .unwrap();
        let otlp = SchemaRegistry::otlp_v1().unwrap();
        let foreign = otlp.lookup(otlp::LOG_RECORD).unwrap();

        let err = small.message(foreign).unwrap_err();
        assert!(matches!(err, OtelGateError::Internal(_)), "{err}");
    }
}
