//! Constant pool: strings, types, field and method references.
//!
//! The pool is the read-only metadata collaborator of the lifter. It is
//! built once (by a decoder or by the assembly front end) and then only
//! read, possibly from several worker threads at the same time.

use crate::errors::{BytecodeError, BytecodeResult};
use crate::types::{Proto, Type};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A typed index into one of the constant pool sections.
#[derive(Debug)]
pub struct Index<T: ?Sized> {
    value: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Index<T> {}

impl<T> Hash for Index<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> Serialize for Index<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.value as u64)
    }
}

impl<T> Index<T> {
    #[must_use]
    pub const fn new(idx: usize) -> Self {
        Self {
            value: idx,
            marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.value
    }
}

/// A field reference, resolved from the pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldRef {
    pub class: Type,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: Type,
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}->{}:{}", self.class, self.name, self.type_)
    }
}

/// A method reference, resolved from the pool.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MethodRef {
    pub class: Type,
    pub name: String,
    pub proto: Proto,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}->{}{}", self.class, self.name, self.proto)
    }
}

/// A constant pool reference carried by an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PoolRef {
    String(Index<String>),
    Type(Index<Type>),
    Field(Index<FieldRef>),
    Method(Index<MethodRef>),
}

impl PoolRef {
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        match self {
            Self::String(i) => i.as_usize(),
            Self::Type(i) => i.as_usize(),
            Self::Field(i) => i.as_usize(),
            Self::Method(i) => i.as_usize(),
        }
    }
}

/// Read access to the constant pool.
///
/// Implementors must be shareable across worker threads, since methods
/// of a same program are lifted concurrently.
pub trait ConstantPool: fmt::Debug + Sync {
    fn string(&self, idx: Index<String>) -> BytecodeResult<&str>;
    fn type_(&self, idx: Index<Type>) -> BytecodeResult<&Type>;
    fn field(&self, idx: Index<FieldRef>) -> BytecodeResult<&FieldRef>;
    fn method(&self, idx: Index<MethodRef>) -> BytecodeResult<&MethodRef>;
}

/// Pretty printing of items that hold pool references.
pub trait PrettyPrint {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()>;
}

pub struct PrettyPrinter<'a, T>(pub &'a T, pub &'a dyn ConstantPool);

impl<'a, T: PrettyPrint> fmt::Display for PrettyPrinter<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.pp(f, self.1).map_err(|_| fmt::Error)
    }
}

impl PrettyPrint for PoolRef {
    fn pp(&self, f: &mut fmt::Formatter, pool: &dyn ConstantPool) -> BytecodeResult<()> {
        match self {
            Self::String(i) => write!(f, "{:?}", pool.string(*i)?)?,
            Self::Type(i) => write!(f, "{}", pool.type_(*i)?)?,
            Self::Field(i) => write!(f, "{}", pool.field(*i)?)?,
            Self::Method(i) => write!(f, "{}", pool.method(*i)?)?,
        }
        Ok(())
    }
}

/// An interning constant pool.
#[derive(Debug, Default)]
pub struct Pool {
    strings: Vec<String>,
    types: Vec<Type>,
    fields: Vec<FieldRef>,
    methods: Vec<MethodRef>,
    string_ids: BTreeMap<String, usize>,
    type_ids: BTreeMap<Type, usize>,
    field_ids: BTreeMap<FieldRef, usize>,
    method_ids: BTreeMap<MethodRef, usize>,
}

fn intern<T: Ord + Clone>(items: &mut Vec<T>, ids: &mut BTreeMap<T, usize>, item: T) -> usize {
    if let Some(id) = ids.get(&item) {
        return *id;
    }
    let id = items.len();
    ids.insert(item.clone(), id);
    items.push(item);
    id
}

impl Pool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_string<S: Into<String>>(&mut self, s: S) -> Index<String> {
        Index::new(intern(&mut self.strings, &mut self.string_ids, s.into()))
    }

    pub fn intern_type(&mut self, t: Type) -> Index<Type> {
        Index::new(intern(&mut self.types, &mut self.type_ids, t))
    }

    pub fn intern_field(&mut self, field: FieldRef) -> Index<FieldRef> {
        Index::new(intern(&mut self.fields, &mut self.field_ids, field))
    }

    pub fn intern_method(&mut self, method: MethodRef) -> Index<MethodRef> {
        Index::new(intern(&mut self.methods, &mut self.method_ids, method))
    }

    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &MethodRef> {
        self.methods.iter()
    }
}

impl ConstantPool for Pool {
    fn string(&self, idx: Index<String>) -> BytecodeResult<&str> {
        self.strings
            .get(idx.as_usize())
            .map(String::as_str)
            .ok_or_else(|| BytecodeError::ResNotFound(format!("string #{}", idx.as_usize())))
    }

    fn type_(&self, idx: Index<Type>) -> BytecodeResult<&Type> {
        self.types
            .get(idx.as_usize())
            .ok_or_else(|| BytecodeError::ResNotFound(format!("type #{}", idx.as_usize())))
    }

    fn field(&self, idx: Index<FieldRef>) -> BytecodeResult<&FieldRef> {
        self.fields
            .get(idx.as_usize())
            .ok_or_else(|| BytecodeError::ResNotFound(format!("field #{}", idx.as_usize())))
    }

    fn method(&self, idx: Index<MethodRef>) -> BytecodeResult<&MethodRef> {
        self.methods
            .get(idx.as_usize())
            .ok_or_else(|| BytecodeError::ResNotFound(format!("method #{}", idx.as_usize())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_reuses_indices() {
        let mut pool = Pool::new();
        let a = pool.intern_string("hello");
        let b = pool.intern_string("world");
        let c = pool.intern_string("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.string(b).unwrap(), "world");
    }

    #[test]
    fn missing_entries() {
        let pool = Pool::new();
        assert!(pool.type_(Index::new(3)).is_err());
        assert!(pool.method(Index::new(0)).is_err());
    }

    #[test]
    fn references_display() {
        let field = FieldRef {
            class: Type::Class("a/B".to_string()),
            name: "count".to_string(),
            type_: Type::Int,
        };
        assert_eq!(field.to_string(), "La/B;->count:I");
        let method = MethodRef {
            class: Type::Class("a/B".to_string()),
            name: "run".to_string(),
            proto: Proto::try_from("(J)V").unwrap(),
        };
        assert_eq!(method.to_string(), "La/B;->run(J)V");
    }
}
