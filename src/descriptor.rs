use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ClassFormatError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl Primitive {
    fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            b'Z' => Self::Boolean,
            b'B' => Self::Byte,
            b'C' => Self::Char,
            b'S' => Self::Short,
            b'I' => Self::Int,
            b'J' => Self::Long,
            b'F' => Self::Float,
            b'D' => Self::Double,
            b'V' => Self::Void,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Char => "char",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Void => "void",
        }
    }
}

/// A field or parameter type decoded from its JVM descriptor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeDescriptor {
    Primitive(Primitive),
    /// Dotted binary name, e.g. `java.util.Map$Entry`.
    Object(String),
    Array(Box<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ClassFormatError> {
        let bytes = descriptor.as_bytes();
        let (ty, end) = parse_one(descriptor, bytes, 0)?;
        if end != bytes.len() {
            return Err(bad(descriptor, "trailing characters"));
        }
        Ok(ty)
    }

    /// The class at the bottom of any array nesting, if it is not a primitive.
    pub fn element_class(&self) -> Option<&str> {
        match self {
            Self::Primitive(_) => None,
            Self::Object(name) => Some(name),
            Self::Array(inner) => inner.element_class(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Void))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, Self::Primitive(Primitive::Boolean))
    }

    /// Rendering with the package stripped, used in method signatures of findings.
    pub fn simple_name(&self) -> String {
        match self {
            Self::Primitive(p) => p.name().to_string(),
            Self::Object(name) => simple_class_name(name).to_string(),
            Self::Array(inner) => format!("{}[]", inner.simple_name()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(p) => f.write_str(p.name()),
            Self::Object(name) => f.write_str(name),
            Self::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub parameters: Vec<TypeDescriptor>,
    pub return_type: TypeDescriptor,
}

impl MethodDescriptor {
    pub fn parse(descriptor: &str) -> Result<Self, ClassFormatError> {
        let bytes = descriptor.as_bytes();
        if bytes.first() != Some(&b'(') {
            return Err(bad(descriptor, "missing `(`"));
        }
        let mut pos = 1;
        let mut parameters = Vec::new();
        loop {
            match bytes.get(pos) {
                Some(b')') => break,
                Some(_) => {
                    let (ty, next) = parse_one(descriptor, bytes, pos)?;
                    if ty.is_void() {
                        return Err(bad(descriptor, "void parameter"));
                    }
                    parameters.push(ty);
                    pos = next;
                }
                None => return Err(bad(descriptor, "missing `)`")),
            }
        }
        let (return_type, end) = parse_one(descriptor, bytes, pos + 1)?;
        if end != bytes.len() {
            return Err(bad(descriptor, "trailing characters"));
        }
        Ok(Self {
            parameters,
            return_type,
        })
    }
}

const MAX_ARRAY_DIMENSIONS: usize = 255;

fn parse_one(
    descriptor: &str,
    bytes: &[u8],
    pos: usize,
) -> Result<(TypeDescriptor, usize), ClassFormatError> {
    let dimensions = bytes[pos.min(bytes.len())..]
        .iter()
        .take_while(|&&b| b == b'[')
        .count();
    if dimensions > MAX_ARRAY_DIMENSIONS {
        return Err(bad(descriptor, "more than 255 array dimensions"));
    }
    let (mut ty, next) = parse_element(descriptor, bytes, pos + dimensions)?;
    if dimensions > 0 && ty.is_void() {
        return Err(bad(descriptor, "array of void"));
    }
    for _ in 0..dimensions {
        ty = TypeDescriptor::Array(Box::new(ty));
    }
    Ok((ty, next))
}

fn parse_element(
    descriptor: &str,
    bytes: &[u8],
    pos: usize,
) -> Result<(TypeDescriptor, usize), ClassFormatError> {
    let Some(&code) = bytes.get(pos) else {
        return Err(bad(descriptor, "unexpected end"));
    };
    match code {
        b'L' => {
            let rest = &descriptor[pos + 1..];
            let end = rest
                .find(';')
                .ok_or_else(|| bad(descriptor, "unterminated class name"))?;
            if end == 0 {
                return Err(bad(descriptor, "empty class name"));
            }
            let name = internal_to_dotted(&rest[..end]);
            Ok((TypeDescriptor::Object(name), pos + 1 + end + 1))
        }
        _ => Primitive::from_code(code)
            .map(|p| (TypeDescriptor::Primitive(p), pos + 1))
            .ok_or_else(|| bad(descriptor, "unknown type code")),
    }
}

fn bad(descriptor: &str, reason: &'static str) -> ClassFormatError {
    ClassFormatError::BadDescriptor {
        descriptor: descriptor.to_string(),
        reason,
    }
}

/// `java/lang/String` -> `java.lang.String`
pub fn internal_to_dotted(name: &str) -> String {
    name.replace('/', ".")
}

/// Turns a `CONSTANT_Class` name into the class it designates. Array classes
/// (`[Ljava/lang/String;`) designate their element class; primitive arrays
/// designate nothing.
pub fn class_constant_target(name: &str) -> Option<String> {
    if name.starts_with('[') {
        TypeDescriptor::parse(name)
            .ok()
            .and_then(|ty| ty.element_class().map(str::to_string))
    } else {
        Some(internal_to_dotted(name))
    }
}

pub fn simple_class_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}
