use crate::model::ClockClass;
use std::collections::BTreeSet;
use std::sync::Arc;

/// A trace-environment entry value.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum EnvValue {
    Integer(i64),
    String(String),
}

/// A decoded field value.
///
/// Scalars and structures are the only shapes the core inspects; nested
/// structures carry whatever the decoder produced. The root structure of a
/// header/context/payload never has a name.
#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Scalar(Option<String>, ScalarField),
    Structure(Option<String>, Vec<Field>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScalarField {
    Bool(bool),
    UnsignedInteger(u64),
    SignedInteger(i64),
    SinglePrecisionReal(f32),
    DoublePrecisionReal(f64),
    String(String),
    UnsignedEnumeration(u64, BTreeSet<String>),
    SignedEnumeration(i64, BTreeSet<String>),
}

impl Field {
    pub fn name(&self) -> Option<&str> {
        match self {
            Field::Scalar(n, _) | Field::Structure(n, _) => n.as_deref(),
        }
    }

    /// Looks up a direct member of a structure field by name.
    pub fn member(&self, name: &str) -> Option<&Field> {
        match self {
            Field::Structure(_, members) => members.iter().find(|f| f.name() == Some(name)),
            Field::Scalar(..) => None,
        }
    }

    /// The unsigned value of a scalar field, if it carries one.
    pub fn as_unsigned(&self) -> Option<u64> {
        match self {
            Field::Scalar(_, ScalarField::UnsignedInteger(v))
            | Field::Scalar(_, ScalarField::UnsignedEnumeration(v, _)) => Some(*v),
            _ => None,
        }
    }
}

/// Layout of a structure field type, as declared by the trace metadata.
#[derive(Clone, Debug, Default)]
pub struct StructLayout {
    pub members: Vec<StructMember>,
}

#[derive(Clone, Debug)]
pub struct StructMember {
    pub name: String,
    pub ty: FieldType,
}

/// Field type of a structure member.
///
/// Unsigned integers may map a clock class; that mapping is what turns a
/// raw `timestamp_begin` into nanoseconds since epoch.
#[derive(Clone, Debug)]
pub enum FieldType {
    Bool,
    UnsignedInteger { mapped_clock: Option<Arc<ClockClass>> },
    SignedInteger,
    Real,
    String,
    UnsignedEnumeration,
    SignedEnumeration,
    Struct(StructLayout),
}

impl StructLayout {
    pub fn new(members: Vec<StructMember>) -> Self {
        StructLayout { members }
    }

    pub fn member(&self, name: &str) -> Option<&StructMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

impl StructMember {
    pub fn new<N: Into<String>>(name: N, ty: FieldType) -> Self {
        StructMember {
            name: name.into(),
            ty,
        }
    }

    /// The clock class mapped by this member's type, if any.
    pub fn mapped_clock(&self) -> Option<&Arc<ClockClass>> {
        match &self.ty {
            FieldType::UnsignedInteger { mapped_clock } => mapped_clock.as_ref(),
            _ => None,
        }
    }
}
