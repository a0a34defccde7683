//! Pluggable member lookup
//!
//! The call bridge only marshals. Finding and invoking host members is the
//! job of a [`MemberResolver`]: reflection on a managed host, a generated
//! table, or symbol lookup over FFI.

use crate::{HostError, HostValue, ObjectRef};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    StaticMethod,
    Constructor,
    Field,
    StaticField,
}

impl MemberKind {
    pub fn is_static(self) -> bool {
        matches!(self, MemberKind::StaticMethod | MemberKind::StaticField)
    }
}

/// Everything that identifies one host member.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub kind: MemberKind,
    pub type_name: String,
    pub member: String,
    /// Method signature or field descriptor, as written by the caller.
    pub descriptor: String,
}

impl MemberKey {
    pub fn new(
        kind: MemberKind,
        type_name: impl Into<String>,
        member: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
            member: member.into(),
            descriptor: descriptor.into(),
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = if self.kind.is_static() { "::" } else { "." };
        write!(f, "{}{sep}{}{}", self.type_name, self.member, self.descriptor)
    }
}

/// Resolved member id, meaningful only to the resolver that issued it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberId(pub u64);

pub trait MemberResolver: Send + Sync {
    /// Look the member up. `None` if the host has no such member.
    fn resolve(&self, key: &MemberKey) -> Option<MemberId>;

    /// Invoke a method or constructor. `target` is `None` for static
    /// methods and constructors. Constructors return the new object.
    fn invoke(
        &self,
        member: MemberId,
        target: Option<ObjectRef>,
        args: &[HostValue],
    ) -> Result<HostValue, HostError>;

    fn get_field(&self, member: MemberId, target: Option<ObjectRef>) -> Result<HostValue, HostError>;

    fn set_field(
        &self,
        member: MemberId,
        target: Option<ObjectRef>,
        value: HostValue,
    ) -> Result<(), HostError>;

    /// Drop the host's pin on `object`. Returns `false` for unknown refs.
    fn release(&self, _object: ObjectRef) -> bool {
        false
    }
}
