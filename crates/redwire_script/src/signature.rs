//! Compact member signatures
//!
//! A method signature is a parenthesized list of parameter types followed
//! by a return type, e.g. `(ILjava/lang/String;)Z`. Field accesses use a
//! single type descriptor such as `I` or `[D`.
//!
//! | code | type |
//! |------|------|
//! | `Z` | boolean |
//! | `B` `C` `S` | byte, char, short |
//! | `I` `J` | 32-bit and 64-bit integers |
//! | `F` `D` | single and double precision floats |
//! | `L<name>;` | object reference (`Ljava/lang/String;` is a string) |
//! | `[<type>` | array of `<type>` |
//! | `V` | void (return position only) |

use crate::CallError;
use std::fmt;
use std::str::FromStr;

pub const STRING_CLASS: &str = "java/lang/String";

/// One value type in a signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Object(String),
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    pub fn string() -> Self {
        TypeDesc::Object(STRING_CLASS.to_string())
    }

    pub fn is_string(&self) -> bool {
        matches!(self, TypeDesc::Object(class) if class == STRING_CLASS)
    }

    /// True for every type passed by reference (objects, strings and arrays).
    pub fn is_reference(&self) -> bool {
        matches!(self, TypeDesc::Object(_) | TypeDesc::Array(_))
    }

    /// Parse a standalone field descriptor.
    pub fn parse(descriptor: &str) -> Result<Self, CallError> {
        let mut cursor = Cursor::new(descriptor);
        let ty = cursor.value_type()?;
        cursor.finish()?;
        Ok(ty)
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Boolean => f.write_str("Z"),
            TypeDesc::Byte => f.write_str("B"),
            TypeDesc::Char => f.write_str("C"),
            TypeDesc::Short => f.write_str("S"),
            TypeDesc::Int => f.write_str("I"),
            TypeDesc::Long => f.write_str("J"),
            TypeDesc::Float => f.write_str("F"),
            TypeDesc::Double => f.write_str("D"),
            TypeDesc::Object(class) => write!(f, "L{class};"),
            TypeDesc::Array(element) => write!(f, "[{element}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ReturnDesc {
    Void,
    Value(TypeDesc),
}

impl fmt::Display for ReturnDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnDesc::Void => f.write_str("V"),
            ReturnDesc::Value(ty) => fmt::Display::fmt(ty, f),
        }
    }
}

/// Parsed method signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    params: Vec<TypeDesc>,
    ret: ReturnDesc,
}

impl Signature {
    pub fn new(params: Vec<TypeDesc>, ret: ReturnDesc) -> Self {
        Self { params, ret }
    }

    pub fn parse(signature: &str) -> Result<Self, CallError> {
        let mut cursor = Cursor::new(signature);
        cursor.expect(b'(', "must start with '('")?;

        let mut params = Vec::new();
        loop {
            match cursor.peek() {
                Some(b')') => {
                    cursor.bump();
                    break;
                }
                Some(_) => params.push(cursor.value_type()?),
                None => return Err(cursor.error("unterminated parameter list")),
            }
        }

        let ret = match cursor.peek() {
            Some(b'V') => {
                cursor.bump();
                ReturnDesc::Void
            }
            Some(_) => ReturnDesc::Value(cursor.value_type()?),
            None => return Err(cursor.error("missing return type")),
        };
        cursor.finish()?;

        Ok(Self { params, ret })
    }

    pub fn params(&self) -> &[TypeDesc] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn return_type(&self) -> &ReturnDesc {
        &self.ret
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            fmt::Display::fmt(param, f)?;
        }
        write!(f, "){}", self.ret)
    }
}

impl FromStr for Signature {
    type Err = CallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn error(&self, reason: impl fmt::Display) -> CallError {
        CallError::malformed(self.source, format!("{reason} at offset {}", self.pos))
    }

    fn expect(&mut self, byte: u8, reason: &str) -> Result<(), CallError> {
        if self.peek() == Some(byte) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(reason))
        }
    }

    fn finish(&self) -> Result<(), CallError> {
        if self.pos == self.source.len() {
            Ok(())
        } else {
            Err(self.error("trailing characters"))
        }
    }

    fn value_type(&mut self) -> Result<TypeDesc, CallError> {
        let Some(code) = self.peek() else {
            return Err(self.error("expected a type"));
        };
        self.bump();
        Ok(match code {
            b'Z' => TypeDesc::Boolean,
            b'B' => TypeDesc::Byte,
            b'C' => TypeDesc::Char,
            b'S' => TypeDesc::Short,
            b'I' => TypeDesc::Int,
            b'J' => TypeDesc::Long,
            b'F' => TypeDesc::Float,
            b'D' => TypeDesc::Double,
            b'L' => {
                let source = self.source;
                let rest = &source[self.pos..];
                let end = rest
                    .find(';')
                    .ok_or_else(|| self.error("unterminated class name"))?;
                let class = &rest[..end];
                if class.is_empty() || class.contains(['(', ')', '[', '.']) {
                    return Err(self.error(format!("invalid class name '{class}'")));
                }
                self.pos += end + 1;
                TypeDesc::Object(class.to_string())
            }
            b'[' => TypeDesc::Array(Box::new(self.value_type()?)),
            b'V' => return Err(self.error("void is only valid as a return type")),
            other => {
                self.pos -= 1;
                return Err(self.error(format!("unknown type code '{}'", other as char)));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitives_objects_and_arrays() {
        let sig = Signature::parse("(IJLjava/lang/String;[DZ)Lnet/host/World;").unwrap();
        assert_eq!(
            sig.params(),
            &[
                TypeDesc::Int,
                TypeDesc::Long,
                TypeDesc::string(),
                TypeDesc::Array(Box::new(TypeDesc::Double)),
                TypeDesc::Boolean,
            ]
        );
        assert_eq!(
            sig.return_type(),
            &ReturnDesc::Value(TypeDesc::Object("net/host/World".into()))
        );
        assert_eq!(sig.to_string(), "(IJLjava/lang/String;[DZ)Lnet/host/World;");
    }

    #[test]
    fn empty_parameter_list_and_void() {
        let sig: Signature = "()V".parse().unwrap();
        assert_eq!(sig.arity(), 0);
        assert_eq!(sig.return_type(), &ReturnDesc::Void);
    }

    #[test]
    fn rejects_malformed_signatures() {
        for bad in [
            "",
            "I)Z",
            "(I",
            "(I)",
            "(V)Z",
            "(Q)Z",
            "(Ljava/lang/String)Z",
            "(L;)Z",
            "(I)ZZ",
            "([)V",
        ] {
            let err = Signature::parse(bad).unwrap_err();
            assert!(
                matches!(err, CallError::MalformedSignature { .. }),
                "{bad:?} produced {err:?}"
            );
        }
    }

    #[test]
    fn field_descriptors() {
        assert_eq!(TypeDesc::parse("I").unwrap(), TypeDesc::Int);
        assert!(TypeDesc::parse("Ljava/lang/String;").unwrap().is_string());
        assert!(TypeDesc::parse("[[I").unwrap().is_reference());
        assert!(TypeDesc::parse("II").is_err());
        assert!(TypeDesc::parse("V").is_err());
    }
}
