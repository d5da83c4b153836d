//! Decoder for the JVM class-file format.
//!
//! Produces [`ClassEntity`] values directly; nothing of the raw constant pool
//! survives past decoding, so the universe only ever holds symbolic names.

use crate::bytecode;
use crate::descriptor::{MethodDescriptor, TypeDescriptor, class_constant_target, internal_to_dotted};
use crate::error::ClassFormatError;
use crate::universe::{AccessFlags, ClassEntity, ClassKind, FieldEntity, MethodEntity};

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    Unusable,
    Utf8(String),
    Numeric,
    String(u16),
    Class(u16),
    FieldRef(u16, u16),
    MethodRef(u16, u16),
    InterfaceMethodRef(u16, u16),
    NameAndType(u16, u16),
    MethodHandle(u8, u16),
    MethodType(u16),
    Dynamic(u16, u16),
    InvokeDynamic(u16, u16),
    Module(u16),
    Package(u16),
}

#[derive(Debug, Clone)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl ConstantPool {
    #[cfg(test)]
    pub(crate) fn from_entries(entries: Vec<Constant>) -> Self {
        let mut all = vec![Constant::Unusable];
        all.extend(entries);
        Self { entries: all }
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, ClassFormatError> {
        let count = reader.u2()?;
        let mut entries = Vec::with_capacity(usize::from(count));
        entries.push(Constant::Unusable);
        let mut index = 1u16;
        while index < count {
            let tag = reader.u1()?;
            let constant = match tag {
                1 => {
                    let len = usize::from(reader.u2()?);
                    Constant::Utf8(String::from_utf8_lossy(reader.take(len)?).into_owned())
                }
                3 | 4 => {
                    reader.take(4)?;
                    Constant::Numeric
                }
                5 | 6 => {
                    reader.take(8)?;
                    Constant::Numeric
                }
                7 => Constant::Class(reader.u2()?),
                8 => Constant::String(reader.u2()?),
                9 => Constant::FieldRef(reader.u2()?, reader.u2()?),
                10 => Constant::MethodRef(reader.u2()?, reader.u2()?),
                11 => Constant::InterfaceMethodRef(reader.u2()?, reader.u2()?),
                12 => Constant::NameAndType(reader.u2()?, reader.u2()?),
                15 => Constant::MethodHandle(reader.u1()?, reader.u2()?),
                16 => Constant::MethodType(reader.u2()?),
                17 => Constant::Dynamic(reader.u2()?, reader.u2()?),
                18 => Constant::InvokeDynamic(reader.u2()?, reader.u2()?),
                19 => Constant::Module(reader.u2()?),
                20 => Constant::Package(reader.u2()?),
                _ => return Err(ClassFormatError::UnknownConstantTag { tag, index }),
            };
            entries.push(constant);
            // Long and double constants occupy two slots.
            if matches!(tag, 5 | 6) {
                entries.push(Constant::Unusable);
                index = index.saturating_add(1);
            }
            index = index.saturating_add(1);
        }
        Ok(Self { entries })
    }

    fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(usize::from(index))
    }

    pub fn utf8(&self, index: u16) -> Result<&str, ClassFormatError> {
        match self.get(index) {
            Some(Constant::Utf8(s)) => Ok(s),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal (slash-separated) name held by a `CONSTANT_Class`.
    pub fn class_name(&self, index: u16) -> Result<String, ClassFormatError> {
        self.class_name_opt(index)
            .map(str::to_string)
            .ok_or(ClassFormatError::BadConstant {
                index,
                expected: "Class",
            })
    }

    pub fn class_name_opt(&self, index: u16) -> Option<&str> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name).ok(),
            _ => None,
        }
    }

    fn name_and_type(&self, index: u16) -> Result<(String, String), ClassFormatError> {
        match self.get(index) {
            Some(Constant::NameAndType(name, descriptor)) => Ok((
                self.utf8(*name)?.to_string(),
                self.utf8(*descriptor)?.to_string(),
            )),
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    /// Owner (dotted), name and descriptor of a field or method reference.
    pub fn member_ref(&self, index: u16) -> Result<(String, String, String), ClassFormatError> {
        match self.get(index) {
            Some(
                Constant::FieldRef(class, nat)
                | Constant::MethodRef(class, nat)
                | Constant::InterfaceMethodRef(class, nat),
            ) => {
                // Members of primitive arrays (`int[].clone()`) live on Object.
                let owner = class_constant_target(&self.class_name(*class)?)
                    .unwrap_or_else(|| "java.lang.Object".to_string());
                let (name, descriptor) = self.name_and_type(*nat)?;
                Ok((owner, name, descriptor))
            }
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "member reference",
            }),
        }
    }

    pub fn dynamic_name_and_type(&self, index: u16) -> Result<(String, String), ClassFormatError> {
        match self.get(index) {
            Some(Constant::InvokeDynamic(_, nat) | Constant::Dynamic(_, nat)) => {
                self.name_and_type(*nat)
            }
            _ => Err(ClassFormatError::BadConstant {
                index,
                expected: "InvokeDynamic",
            }),
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ClassFormatError> {
        let end = self.pos.checked_add(len).filter(|end| *end <= self.bytes.len());
        let Some(end) = end else {
            return Err(ClassFormatError::Truncated {
                offset: self.pos,
                wanted: len,
            });
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u1(&mut self) -> Result<u8, ClassFormatError> {
        Ok(self.take(1)?[0])
    }

    fn u2(&mut self) -> Result<u16, ClassFormatError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u4(&mut self) -> Result<u32, ClassFormatError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }
}

struct Attribute<'a> {
    name: &'a str,
    data: &'a [u8],
}

fn read_attributes<'a>(
    reader: &mut Reader<'a>,
    pool: &'a ConstantPool,
) -> Result<Vec<Attribute<'a>>, ClassFormatError> {
    let count = reader.u2()?;
    let mut attributes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name = pool.utf8(reader.u2()?)?;
        let len = reader.u4()? as usize;
        let data = reader.take(len)?;
        attributes.push(Attribute { name, data });
    }
    Ok(attributes)
}

pub fn parse_class(bytes: &[u8]) -> Result<ClassEntity, ClassFormatError> {
    let mut reader = Reader::new(bytes);
    let magic = reader.u4()?;
    if magic != MAGIC {
        return Err(ClassFormatError::BadMagic(magic));
    }
    let _minor = reader.u2()?;
    let _major = reader.u2()?;
    let pool = ConstantPool::read(&mut reader)?;

    let access = AccessFlags(reader.u2()?);
    let this_index = reader.u2()?;
    let name = internal_to_dotted(&pool.class_name(this_index)?);
    let super_index = reader.u2()?;
    let superclass = if super_index == 0 {
        None
    } else {
        Some(internal_to_dotted(&pool.class_name(super_index)?))
    };

    let interface_count = reader.u2()?;
    let mut interfaces = Vec::with_capacity(usize::from(interface_count));
    for _ in 0..interface_count {
        interfaces.push(internal_to_dotted(&pool.class_name(reader.u2()?)?));
    }

    let field_count = reader.u2()?;
    let mut fields = Vec::with_capacity(usize::from(field_count));
    for _ in 0..field_count {
        fields.push(read_field(&mut reader, &pool, &name)?);
    }

    let method_count = reader.u2()?;
    let mut methods = Vec::with_capacity(usize::from(method_count));
    for _ in 0..method_count {
        methods.push(read_method(&mut reader, &pool, &name)?);
    }

    let mut annotations = Vec::new();
    let mut static_nested = false;
    for attribute in read_attributes(&mut reader, &pool)? {
        match attribute.name {
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                read_annotations(attribute.data, &pool, &mut annotations)?;
            }
            "InnerClasses" => {
                static_nested = read_static_nest(attribute.data, &pool, this_index)?;
            }
            _ => {}
        }
    }

    let kind = if access.is_interface() {
        ClassKind::Interface
    } else {
        ClassKind::Class
    };

    Ok(ClassEntity {
        name,
        kind,
        access,
        superclass,
        interfaces,
        methods,
        fields,
        annotations,
        static_nested,
        opaque: false,
    })
}

fn read_field<'a>(
    reader: &mut Reader<'a>,
    pool: &'a ConstantPool,
    owner: &str,
) -> Result<FieldEntity, ClassFormatError> {
    let access = AccessFlags(reader.u2()?);
    let name = pool.utf8(reader.u2()?)?.to_string();
    let field_type = TypeDescriptor::parse(pool.utf8(reader.u2()?)?)?;
    let mut annotations = Vec::new();
    for attribute in read_attributes(reader, pool)? {
        if is_annotation_attribute(attribute.name) {
            read_annotations(attribute.data, pool, &mut annotations)?;
        }
    }
    Ok(FieldEntity {
        owner: owner.to_string(),
        name,
        field_type,
        access,
        annotations,
    })
}

fn read_method<'a>(
    reader: &mut Reader<'a>,
    pool: &'a ConstantPool,
    owner: &str,
) -> Result<MethodEntity, ClassFormatError> {
    let access = AccessFlags(reader.u2()?);
    let name = pool.utf8(reader.u2()?)?.to_string();
    let descriptor = pool.utf8(reader.u2()?)?.to_string();
    let signature = MethodDescriptor::parse(&descriptor)?;

    let mut method = MethodEntity::from_parts(owner, name, descriptor, signature, access);
    for attribute in read_attributes(reader, pool)? {
        match attribute.name {
            "Code" => {
                let (code, caught) = read_code(attribute.data, pool)?;
                method.code = Some(code);
                method.caught_types = caught;
            }
            "Exceptions" => {
                let mut sub = Reader::new(attribute.data);
                let count = sub.u2()?;
                for _ in 0..count {
                    method
                        .exceptions
                        .push(internal_to_dotted(&pool.class_name(sub.u2()?)?));
                }
            }
            name if is_annotation_attribute(name) => {
                read_annotations(attribute.data, pool, &mut method.annotations)?;
            }
            _ => {}
        }
    }
    Ok(method)
}

fn read_code(
    data: &[u8],
    pool: &ConstantPool,
) -> Result<(Vec<bytecode::Instruction>, Vec<String>), ClassFormatError> {
    let mut reader = Reader::new(data);
    let _max_stack = reader.u2()?;
    let _max_locals = reader.u2()?;
    let len = reader.u4()? as usize;
    let code = reader.take(len)?;
    let instructions = bytecode::decode(code, pool)?;

    let handlers = reader.u2()?;
    let mut caught = Vec::new();
    for _ in 0..handlers {
        reader.take(6)?;
        let catch_type = reader.u2()?;
        if catch_type != 0 {
            let name = internal_to_dotted(&pool.class_name(catch_type)?);
            if !caught.contains(&name) {
                caught.push(name);
            }
        }
    }
    Ok((instructions, caught))
}

fn is_annotation_attribute(name: &str) -> bool {
    matches!(
        name,
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations"
    )
}

/// Collects every class named by the annotations: the annotation types,
/// enum constant types, class literals and nested annotations.
fn read_annotations(
    data: &[u8],
    pool: &ConstantPool,
    out: &mut Vec<String>,
) -> Result<(), ClassFormatError> {
    let mut reader = Reader::new(data);
    let count = reader.u2()?;
    for _ in 0..count {
        read_annotation(&mut reader, pool, out)?;
    }
    Ok(())
}

fn read_annotation(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
    out: &mut Vec<String>,
) -> Result<(), ClassFormatError> {
    push_descriptor_class(pool.utf8(reader.u2()?)?, out);
    let pairs = reader.u2()?;
    for _ in 0..pairs {
        let _element_name = reader.u2()?;
        read_element_value(reader, pool, out)?;
    }
    Ok(())
}

fn read_element_value(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
    out: &mut Vec<String>,
) -> Result<(), ClassFormatError> {
    match reader.u1()? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
            reader.u2()?;
        }
        b'e' => {
            push_descriptor_class(pool.utf8(reader.u2()?)?, out);
            reader.u2()?;
        }
        b'c' => push_descriptor_class(pool.utf8(reader.u2()?)?, out),
        b'@' => read_annotation(reader, pool, out)?,
        b'[' => {
            let count = reader.u2()?;
            for _ in 0..count {
                read_element_value(reader, pool, out)?;
            }
        }
        _ => {
            return Err(ClassFormatError::BadAttribute {
                attribute: "annotation",
                reason: "unknown element value tag",
            });
        }
    }
    Ok(())
}

fn push_descriptor_class(descriptor: &str, out: &mut Vec<String>) {
    // Class literals may be `V` or primitives; those name no class.
    if let Ok(ty) = TypeDescriptor::parse(descriptor)
        && let Some(class) = ty.element_class()
        && !out.iter().any(|c| c == class)
    {
        out.push(class.to_string());
    }
}

fn read_static_nest(
    data: &[u8],
    pool: &ConstantPool,
    this_index: u16,
) -> Result<bool, ClassFormatError> {
    let mut reader = Reader::new(data);
    let count = reader.u2()?;
    if data.len() != 2 + 8 * usize::from(count) {
        return Err(ClassFormatError::BadAttribute {
            attribute: "InnerClasses",
            reason: "length does not match entry count",
        });
    }
    let this_name = pool.class_name_opt(this_index);
    let mut is_static = false;
    for _ in 0..count {
        let inner = reader.u2()?;
        let _outer = reader.u2()?;
        let _inner_name = reader.u2()?;
        let flags = AccessFlags(reader.u2()?);
        if (inner == this_index || pool.class_name_opt(inner) == this_name) && flags.is_static() {
            is_static = true;
        }
    }
    Ok(is_static)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = parse_class(&[0xCA, 0xFE, 0xBA, 0xBF, 0, 0, 0, 52]).unwrap_err();
        assert!(matches!(err, ClassFormatError::BadMagic(0xCAFE_BABF)));
    }

    #[test]
    fn rejects_truncated_constant_pool() {
        let bytes = [0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 5, 1, 0, 10, b'a'];
        assert!(matches!(
            parse_class(&bytes),
            Err(ClassFormatError::Truncated { .. })
        ));
    }

    #[test]
    fn long_constants_take_two_slots() {
        // count=4: #1 Long (slots 1,2), #3 Utf8 "x"
        let mut bytes = vec![0, 4, 5];
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(&[1, 0, 1, b'x']);
        let mut reader = Reader::new(&bytes);
        let pool = ConstantPool::read(&mut reader).unwrap();
        assert_eq!(pool.utf8(3).unwrap(), "x");
        assert!(pool.utf8(2).is_err());
        assert!(reader.is_empty());
    }

    #[test]
    fn member_refs_on_primitive_arrays_resolve_to_object() {
        let pool = ConstantPool::from_entries(vec![
            Constant::Utf8("[I".to_string()),     // 1
            Constant::Class(1),                   // 2
            Constant::Utf8("clone".to_string()),  // 3
            Constant::Utf8("()Ljava/lang/Object;".to_string()), // 4
            Constant::NameAndType(3, 4),          // 5
            Constant::MethodRef(2, 5),            // 6
        ]);
        let (owner, name, _) = pool.member_ref(6).unwrap();
        assert_eq!(owner, "java.lang.Object");
        assert_eq!(name, "clone");
    }

    #[test]
    fn inner_classes_length_is_checked_on_every_path() {
        let pool = ConstantPool::from_entries(vec![
            Constant::Utf8("a/Outer$Inner".to_string()), // 1
            Constant::Class(1),                          // 2
        ]);
        let entry = [0, 1, 0, 2, 0, 0, 0, 0, 0, 0x08];
        assert!(read_static_nest(&entry, &pool, 2).unwrap());

        let mut trailing = entry.to_vec();
        trailing.push(0);
        assert!(matches!(
            read_static_nest(&trailing, &pool, 2),
            Err(ClassFormatError::BadAttribute { attribute: "InnerClasses", .. })
        ));

        let not_static = [0, 1, 0, 2, 0, 0, 0, 0, 0, 0x01, 0xFF];
        assert!(read_static_nest(&not_static, &pool, 2).is_err());
    }
}
