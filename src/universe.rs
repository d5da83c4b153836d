//! The frozen class model of one analyzed artifact.
//!
//! A [`Universe`] is built once from a list of binary locations (or from
//! already-decoded entities) and never mutated afterwards. Classes are
//! addressed by [`ClassId`], an index into the name-ordered class list.

use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::bytecode::Instruction;
use crate::catalog;
use crate::descriptor::{MethodDescriptor, TypeDescriptor, simple_class_name};
use crate::error::{ClassFormatError, LoadError};
use crate::origin::PackagePattern;

pub const OBJECT: &str = "java.lang.Object";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    Class,
    Interface,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const SUPER: u16 = 0x0020;
    pub const BRIDGE: u16 = 0x0040;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;

    fn has(self, flag: u16) -> bool {
        self.0 & flag != 0
    }

    pub fn is_public(self) -> bool {
        self.has(Self::PUBLIC)
    }

    pub fn is_private(self) -> bool {
        self.has(Self::PRIVATE)
    }

    pub fn is_protected(self) -> bool {
        self.has(Self::PROTECTED)
    }

    pub fn is_static(self) -> bool {
        self.has(Self::STATIC)
    }

    /// Only meaningful on methods; the same bit means `volatile` on fields.
    pub fn is_bridge(self) -> bool {
        self.has(Self::BRIDGE)
    }

    pub fn is_interface(self) -> bool {
        self.has(Self::INTERFACE)
    }

    pub fn is_abstract(self) -> bool {
        self.has(Self::ABSTRACT)
    }

    pub fn is_synthetic(self) -> bool {
        self.has(Self::SYNTHETIC)
    }
}

/// Something a method body mentions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReferencedSymbol {
    Type {
        name: String,
    },
    Field {
        owner: String,
        name: String,
        descriptor: String,
    },
    Method {
        owner: String,
        name: String,
        descriptor: String,
    },
}

impl ReferencedSymbol {
    pub fn owner(&self) -> &str {
        match self {
            Self::Type { name } => name,
            Self::Field { owner, .. } | Self::Method { owner, .. } => owner,
        }
    }
}

impl fmt::Display for ReferencedSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type { name } => write!(f, "type `{name}`"),
            Self::Field { owner, name, .. } => write!(f, "field `{owner}.{name}`"),
            Self::Method {
                owner,
                name,
                descriptor,
            } => {
                let params = MethodDescriptor::parse(descriptor)
                    .map(|d| render_parameters(&d.parameters))
                    .unwrap_or_else(|_| "..".to_string());
                write!(f, "method `{owner}.{name}({params})`")
            }
        }
    }
}

fn render_parameters(parameters: &[TypeDescriptor]) -> String {
    parameters
        .iter()
        .map(TypeDescriptor::simple_name)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodEntity {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub signature: MethodDescriptor,
    pub access: AccessFlags,
    /// `None` for abstract and native methods.
    pub code: Option<Vec<Instruction>>,
    pub caught_types: Vec<String>,
    pub exceptions: Vec<String>,
    pub annotations: Vec<String>,
    #[serde(skip)]
    symbols: OnceCell<Vec<ReferencedSymbol>>,
}

impl MethodEntity {
    pub fn new(name: &str, descriptor: &str) -> Result<Self, ClassFormatError> {
        let signature = MethodDescriptor::parse(descriptor)?;
        Ok(Self::from_parts(
            "",
            name.to_string(),
            descriptor.to_string(),
            signature,
            AccessFlags(AccessFlags::PUBLIC),
        ))
    }

    pub(crate) fn from_parts(
        owner: &str,
        name: String,
        descriptor: String,
        signature: MethodDescriptor,
        access: AccessFlags,
    ) -> Self {
        Self {
            owner: owner.to_string(),
            name,
            descriptor,
            signature,
            access,
            code: None,
            caught_types: Vec::new(),
            exceptions: Vec::new(),
            annotations: Vec::new(),
            symbols: OnceCell::new(),
        }
    }

    pub fn with_access(mut self, access: u16) -> Self {
        self.access = AccessFlags(access);
        self
    }

    pub fn with_code(mut self, code: Vec<Instruction>) -> Self {
        self.code = Some(code);
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>" || self.name == "<clinit>"
    }

    /// Structural override equivalence: same name and erased parameter types.
    pub fn same_signature(&self, other: &MethodEntity) -> bool {
        self.name == other.name && self.signature.parameters == other.signature.parameters
    }

    pub fn matches(&self, name: &str, descriptor: &str) -> bool {
        self.name == name && self.descriptor == descriptor
    }

    /// `setFoo(String)`
    pub fn display_signature(&self) -> String {
        format!(
            "{}({})",
            self.name,
            render_parameters(&self.signature.parameters)
        )
    }

    /// Types, fields and methods the body mentions, ordered and without duplicates.
    pub fn referenced_symbols(&self) -> &[ReferencedSymbol] {
        self.symbols.get_or_init(|| {
            let mut symbols = BTreeSet::new();
            for class in &self.caught_types {
                symbols.insert(ReferencedSymbol::Type {
                    name: class.clone(),
                });
            }
            for instruction in self.code.iter().flatten() {
                match instruction {
                    Instruction::Invoke {
                        owner,
                        name,
                        descriptor,
                        ..
                    } => {
                        symbols.insert(ReferencedSymbol::Method {
                            owner: owner.clone(),
                            name: name.clone(),
                            descriptor: descriptor.clone(),
                        });
                    }
                    Instruction::Field {
                        owner,
                        name,
                        descriptor,
                        ..
                    } => {
                        symbols.insert(ReferencedSymbol::Field {
                            owner: owner.clone(),
                            name: name.clone(),
                            descriptor: descriptor.clone(),
                        });
                    }
                    Instruction::Type {
                        class: Some(class), ..
                    }
                    | Instruction::ClassConstant { class: Some(class) } => {
                        symbols.insert(ReferencedSymbol::Type {
                            name: class.clone(),
                        });
                    }
                    _ => {}
                }
            }
            symbols.into_iter().collect()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEntity {
    pub owner: String,
    pub name: String,
    pub field_type: TypeDescriptor,
    pub access: AccessFlags,
    pub annotations: Vec<String>,
}

impl FieldEntity {
    pub fn new(name: &str, field_type: TypeDescriptor) -> Self {
        Self {
            owner: String::new(),
            name: name.to_string(),
            field_type,
            access: AccessFlags(AccessFlags::PRIVATE),
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassEntity {
    pub name: String,
    pub kind: ClassKind,
    pub access: AccessFlags,
    /// Absent only for `java.lang.Object`.
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub methods: Vec<MethodEntity>,
    pub fields: Vec<FieldEntity>,
    pub annotations: Vec<String>,
    pub static_nested: bool,
    /// Placeholder for an absent runtime type; has no members.
    pub opaque: bool,
}

impl ClassEntity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ClassKind::Class,
            access: AccessFlags(AccessFlags::PUBLIC | AccessFlags::SUPER),
            superclass: (name != OBJECT).then(|| OBJECT.to_string()),
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            annotations: Vec::new(),
            static_nested: false,
            opaque: false,
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut class = Self::new(name);
        class.kind = ClassKind::Interface;
        class.access = AccessFlags(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT);
        class
    }

    fn placeholder(name: &str, kind: ClassKind) -> Self {
        let mut class = match kind {
            ClassKind::Class => Self::new(name),
            ClassKind::Interface => Self::interface(name),
        };
        class.opaque = true;
        class
    }

    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.to_string());
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn with_access(mut self, access: u16) -> Self {
        self.access = AccessFlags(access);
        self
    }

    pub fn with_method(mut self, mut method: MethodEntity) -> Self {
        method.owner = self.name.clone();
        self.methods.push(method);
        self
    }

    pub fn with_field(mut self, mut field: FieldEntity) -> Self {
        field.owner = self.name.clone();
        self.fields.push(field);
        self
    }

    pub fn with_annotation(mut self, annotation: &str) -> Self {
        self.annotations.push(annotation.to_string());
        self
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    pub fn is_abstract(&self) -> bool {
        self.access.is_abstract()
    }

    pub fn is_synthetic(&self) -> bool {
        self.access.is_synthetic()
    }

    pub fn simple_name(&self) -> &str {
        simple_class_name(&self.name)
    }

    /// Overridable method with the given name and parameter types, ignoring
    /// the return type. Static and private methods are never overridden.
    pub fn declared_method_like(&self, method: &MethodEntity) -> Option<&MethodEntity> {
        self.methods.iter().find(|m| {
            m.same_signature(method) && !m.access.is_static() && !m.access.is_private()
        })
    }

    pub fn declared_method(&self, name: &str, descriptor: &str) -> Option<&MethodEntity> {
        self.methods.iter().find(|m| m.matches(name, descriptor))
    }

    pub fn supertype_names(&self) -> impl Iterator<Item = &str> {
        self.superclass
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(u32);

impl ClassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct Universe {
    classes: Vec<ClassEntity>,
    index: BTreeMap<String, ClassId>,
}

impl Universe {
    /// Loads every class reachable from `paths`. The first definition of a
    /// class name along the path order wins.
    pub fn open(paths: &[PathBuf], runtime_packages: &[PackagePattern]) -> Result<Self, LoadError> {
        Self::from_classes(catalog::load_locations(paths)?, runtime_packages)
    }

    /// Freezes a set of already-decoded classes. Supertypes in
    /// `runtime_packages` that are missing become opaque placeholders; any
    /// other missing supertype fails the whole universe.
    pub fn from_classes(
        classes: Vec<ClassEntity>,
        runtime_packages: &[PackagePattern],
    ) -> Result<Self, LoadError> {
        let mut by_name: BTreeMap<String, ClassEntity> = BTreeMap::new();
        for class in classes {
            if by_name.contains_key(&class.name) {
                debug!(class = %class.name, "shadowed by an earlier definition");
                continue;
            }
            by_name.insert(class.name.clone(), class);
        }

        let mut pending: Vec<(String, String, ClassKind)> = Vec::new();
        for class in by_name.values() {
            collect_missing(class, &by_name, &mut pending);
        }
        while let Some((class, supertype, kind)) = pending.pop() {
            if by_name.contains_key(&supertype) {
                continue;
            }
            let runtime = supertype == OBJECT
                || runtime_packages.iter().any(|p| p.matches(&supertype));
            if !runtime {
                return Err(LoadError::UnresolvedSupertype { class, supertype });
            }
            let placeholder = ClassEntity::placeholder(&supertype, kind);
            collect_missing(&placeholder, &by_name, &mut pending);
            by_name.insert(supertype, placeholder);
        }

        let mut index = BTreeMap::new();
        let mut ordered = Vec::with_capacity(by_name.len());
        for (position, (name, class)) in by_name.into_iter().enumerate() {
            index.insert(name, ClassId(position as u32));
            ordered.push(class);
        }
        Ok(Self {
            classes: ordered,
            index,
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(|i| ClassId(i as u32))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.index.get(name).copied()
    }

    pub fn resolve(&self, name: &str) -> Option<&ClassEntity> {
        self.id_of(name).map(|id| self.class(id))
    }

    pub fn class(&self, id: ClassId) -> &ClassEntity {
        &self.classes[id.index()]
    }

    /// Superclass chain of `id`, nearest first, excluding `id` itself.
    pub fn superclasses(&self, id: ClassId) -> Superclasses<'_> {
        let mut visited = BTreeSet::new();
        visited.insert(id);
        Superclasses {
            universe: self,
            current: id,
            visited,
        }
    }

    /// Every superclass and interface reachable from `id`, excluding `id`.
    pub fn supertypes(&self, id: ClassId) -> BTreeSet<ClassId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            for name in self.class(next).supertype_names() {
                if let Some(parent) = self.id_of(name)
                    && parent != id
                    && seen.insert(parent)
                {
                    stack.push(parent);
                }
            }
        }
        seen
    }

    pub fn is_subtype_of(&self, id: ClassId, ancestor: &str) -> bool {
        self.id_of(ancestor)
            .is_some_and(|target| self.supertypes(id).contains(&target))
    }

    /// JVM-style resolution: the class itself, its superclasses, then its interfaces.
    pub fn resolve_method(&self, owner: &str, name: &str, descriptor: &str) -> Option<&MethodEntity> {
        let id = self.id_of(owner)?;
        std::iter::once(id)
            .chain(self.superclasses(id))
            .chain(self.supertypes(id))
            .find_map(|candidate| self.class(candidate).declared_method(name, descriptor))
    }
}

fn collect_missing(
    class: &ClassEntity,
    known: &BTreeMap<String, ClassEntity>,
    pending: &mut Vec<(String, String, ClassKind)>,
) {
    let superclass = class
        .superclass
        .iter()
        .map(|name| (name, ClassKind::Class));
    let interfaces = class
        .interfaces
        .iter()
        .map(|name| (name, ClassKind::Interface));
    for (name, kind) in superclass.chain(interfaces) {
        if !known.contains_key(name) {
            pending.push((class.name.clone(), name.clone(), kind));
        }
    }
}

pub struct Superclasses<'a> {
    universe: &'a Universe,
    current: ClassId,
    visited: BTreeSet<ClassId>,
}

impl Iterator for Superclasses<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        let name = self.universe.class(self.current).superclass.as_deref()?;
        let parent = self.universe.id_of(name)?;
        if !self.visited.insert(parent) {
            return None;
        }
        self.current = parent;
        Some(parent)
    }
}
