//! Dalvik typing informations data structures.

use crate::errors::{BytecodeError, BytecodeResult};
use crate::registers::Width;
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// Dalvik concrete type descriptor type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    /// `void` type, only valid for return types.
    Void,
    /// `boolean` type.
    Boolean,
    /// `byte` type.
    Byte,
    /// `short` type.
    Short,
    /// `char` type.
    Char,
    /// `int` type.
    Int,
    /// `long` type.
    Long,
    /// `float` type.
    Float,
    /// `double` type.
    Double,
    /// Array of the given type descriptor, usable recursively for arrays of arrays,
    /// though it is invalid to have more than 255 dimensions.
    Array(usize, Box<Self>),
    /// Type of a fully-qualified class
    Class(String),
}

impl Type {
    /// Returns a java-like representation of the type.
    /// Its result differs from the `Display` implementation, which produces
    /// strings in the Dalvik format.
    #[must_use]
    pub fn to_java_string(&self) -> String {
        match self {
            Self::Void => "void".to_string(),
            Self::Boolean => "boolean".to_string(),
            Self::Byte => "byte".to_string(),
            Self::Short => "short".to_string(),
            Self::Char => "char".to_string(),
            Self::Int => "int".to_string(),
            Self::Long => "long".to_string(),
            Self::Float => "float".to_string(),
            Self::Double => "double".to_string(),
            Self::Array(n, sub) => {
                let mut s = sub.to_java_string();
                for _ in 0..*n {
                    s.push_str("[]");
                }
                s
            }
            Self::Class(name) => name.replace('/', "."),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_reference(&self) -> bool {
        matches!(self, Self::Array(_, _) | Self::Class(_))
    }

    /// Register width needed to hold a value of this type, `None` for `void`.
    #[must_use]
    pub const fn width(&self) -> Option<Width> {
        match self {
            Self::Void => None,
            Self::Long | Self::Double => Some(Width::Wide),
            _ => Some(Width::Narrow),
        }
    }

    /// Returns the type of the elements of an array type.
    #[must_use]
    pub fn element_type(&self) -> Option<Self> {
        match self {
            Self::Array(1, inner) => Some(inner.as_ref().clone()),
            Self::Array(n, inner) => Some(Self::Array(n - 1, inner.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => write!(f, "V"),
            Self::Boolean => write!(f, "Z"),
            Self::Byte => write!(f, "B"),
            Self::Short => write!(f, "S"),
            Self::Char => write!(f, "C"),
            Self::Int => write!(f, "I"),
            Self::Long => write!(f, "J"),
            Self::Float => write!(f, "F"),
            Self::Double => write!(f, "D"),
            Self::Array(n, inner) => {
                for _ in 0..*n {
                    write!(f, "[")?;
                }
                write!(f, "{inner}")
            }
            Self::Class(classname) => write!(f, "L{classname};"),
        }
    }
}

fn conversion_error(s: &str, to: &str) -> BytecodeError {
    BytecodeError::Conversion {
        from: format!("&str ({s:?})"),
        to: to.to_string(),
    }
}

impl TryFrom<&str> for Type {
    type Error = BytecodeError;

    fn try_from(s: &str) -> BytecodeResult<Self> {
        if s.is_empty() {
            return Err(conversion_error(s, "Type"));
        }

        if s == "V" {
            return Ok(Self::Void);
        }

        let i = s.bytes().take_while(|b| *b == b'[').count();
        if i >= s.len() || i >= 255 {
            return Err(conversion_error(s, "Type"));
        }

        let t = match &s[i..] {
            "Z" => Self::Boolean,
            "B" => Self::Byte,
            "S" => Self::Short,
            "C" => Self::Char,
            "I" => Self::Int,
            "J" => Self::Long,
            "F" => Self::Float,
            "D" => Self::Double,
            sub => {
                let l = sub.len();
                if l > 2 && sub.starts_with('L') && sub.ends_with(';') {
                    Self::Class(sub[1..l - 1].to_string())
                } else {
                    return Err(conversion_error(s, "Type"));
                }
            }
        };
        if i == 0 {
            Ok(t)
        } else {
            Ok(Self::Array(i, Box::new(t)))
        }
    }
}

/// Splits a concatenation of type descriptors (as found between the
/// parentheses of a prototype) into its components.
pub(crate) fn split_descriptors(s: &str) -> BytecodeResult<Vec<Type>> {
    let mut types = Vec::new();
    let mut rest = s;
    while !rest.is_empty() {
        let dims = rest.bytes().take_while(|b| *b == b'[').count();
        let len = match rest.as_bytes().get(dims) {
            Some(b'L') => match rest.find(';') {
                Some(end) => end + 1,
                None => return Err(conversion_error(s, "Vec<Type>")),
            },
            Some(_) => dims + 1,
            None => return Err(conversion_error(s, "Vec<Type>")),
        };
        types.push(Type::try_from(&rest[..len])?);
        rest = &rest[len..];
    }
    Ok(types)
}

/// A method prototype: parameters and return types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Proto {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl Proto {
    /// Number of register slots taken by the parameters (excluding any `this`).
    #[must_use]
    pub fn params_slots(&self) -> usize {
        self.params
            .iter()
            .map(|t| t.width().map_or(0, |w| usize::from(w.slots())))
            .sum()
    }
}

impl fmt::Display for Proto {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for t in &self.params {
            write!(f, "{t}")?;
        }
        write!(f, "){}", self.ret)
    }
}

impl TryFrom<&str> for Proto {
    type Error = BytecodeError;

    fn try_from(s: &str) -> BytecodeResult<Self> {
        let inner = s
            .strip_prefix('(')
            .ok_or_else(|| conversion_error(s, "Proto"))?;
        let (params, ret) = inner
            .split_once(')')
            .ok_or_else(|| conversion_error(s, "Proto"))?;
        Ok(Self {
            params: split_descriptors(params)?,
            ret: Type::try_from(ret)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_descriptors() {
        assert_eq!(Type::try_from("I").unwrap(), Type::Int);
        assert_eq!(
            Type::try_from("[[Ljava/lang/String;").unwrap(),
            Type::Array(2, Box::new(Type::Class("java/lang/String".to_string())))
        );
        assert!(Type::try_from("L;").is_err());
        assert!(Type::try_from("[").is_err());
        assert!(Type::try_from("Q").is_err());
    }

    #[test]
    fn array_element_type() {
        let t = Type::try_from("[[I").unwrap();
        assert_eq!(t.element_type(), Some(Type::Array(1, Box::new(Type::Int))));
        assert_eq!(
            t.element_type().and_then(|t| t.element_type()),
            Some(Type::Int)
        );
        assert_eq!(Type::Int.element_type(), None);
    }

    #[test]
    fn prototypes() {
        let proto = Proto::try_from("(IJ[Ljava/lang/Object;D)V").unwrap();
        assert_eq!(proto.params.len(), 4);
        assert_eq!(proto.params[1], Type::Long);
        assert_eq!(proto.ret, Type::Void);
        assert_eq!(proto.params_slots(), 6);
        assert_eq!(proto.to_string(), "(IJ[Ljava/lang/Object;D)V");
        assert!(Proto::try_from("(I").is_err());
        assert!(Proto::try_from("(Ljava/lang)V").is_err());
    }
}
