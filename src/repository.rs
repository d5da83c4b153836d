//! Named, memoised subsets of a [`Universe`].

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use tracing::debug;

use crate::descriptor::{MethodDescriptor, TypeDescriptor};
use crate::origin::{OriginClassifier, TypeOrigin};
use crate::universe::{ClassEntity, ClassId, ReferencedSymbol, Universe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeSetKind {
    TaskTypes,
    PluginTypes,
    ExternalTaskTypes,
    ExternalPluginTypes,
    AllExternalTypes,
    AllExternalReferencedTypes,
}

/// An ordered (by class name) selection of universe members.
#[derive(Debug, Clone)]
pub struct TypeSet {
    kind: TypeSetKind,
    members: Rc<[ClassId]>,
}

impl TypeSet {
    pub fn kind(&self) -> TypeSetKind {
        self.kind
    }

    pub fn ids(&self) -> &[ClassId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TypeRoots {
    pub task_type: String,
    pub plugin_type: String,
}

pub struct TypeRepository {
    universe: Universe,
    classifier: OriginClassifier,
    roots: TypeRoots,
    sets: RefCell<BTreeMap<TypeSetKind, TypeSet>>,
}

impl TypeRepository {
    pub fn new(universe: Universe, classifier: OriginClassifier, roots: TypeRoots) -> Self {
        Self {
            universe,
            classifier,
            roots,
            sets: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn classifier(&self) -> &OriginClassifier {
        &self.classifier
    }

    pub fn origin(&self, class_name: &str) -> TypeOrigin {
        self.classifier.classify(class_name)
    }

    pub fn members(&self, set: &TypeSet) -> impl Iterator<Item = &ClassEntity> {
        set.ids().iter().map(|id| self.universe.class(*id))
    }

    pub fn type_set(&self, kind: TypeSetKind) -> TypeSet {
        if let Some(set) = self.sets.borrow().get(&kind) {
            return set.clone();
        }
        let members = self.compute(kind);
        debug!(?kind, size = members.len(), "computed type set");
        let set = TypeSet {
            kind,
            members: members.into(),
        };
        self.sets.borrow_mut().insert(kind, set.clone());
        set
    }

    fn compute(&self, kind: TypeSetKind) -> Vec<ClassId> {
        match kind {
            TypeSetKind::TaskTypes => self.subtypes_of(&self.roots.task_type),
            TypeSetKind::PluginTypes => self.subtypes_of(&self.roots.plugin_type),
            TypeSetKind::ExternalTaskTypes => self.external(TypeSetKind::TaskTypes),
            TypeSetKind::ExternalPluginTypes => self.external(TypeSetKind::PluginTypes),
            TypeSetKind::AllExternalTypes => {
                let tasks = self.type_set(TypeSetKind::ExternalTaskTypes);
                let plugins = self.type_set(TypeSetKind::ExternalPluginTypes);
                let union: BTreeSet<ClassId> =
                    tasks.ids().iter().chain(plugins.ids()).copied().collect();
                union.into_iter().collect()
            }
            TypeSetKind::AllExternalReferencedTypes => self.referenced_closure(),
        }
    }

    fn subtypes_of(&self, root: &str) -> Vec<ClassId> {
        self.universe
            .ids()
            .filter(|id| {
                let class = self.universe.class(*id);
                !class.opaque && class.name != root && self.universe.is_subtype_of(*id, root)
            })
            .collect()
    }

    fn external(&self, of: TypeSetKind) -> Vec<ClassId> {
        let base = self.type_set(of);
        base.ids()
            .iter()
            .copied()
            .filter(|id| self.is_external(*id))
            .collect()
    }

    fn is_external(&self, id: ClassId) -> bool {
        let class = self.universe.class(id);
        !class.opaque && self.origin(&class.name) == TypeOrigin::External
    }

    /// Every loaded external type reachable from the external task and plugin
    /// types through declarations and method bodies.
    fn referenced_closure(&self) -> Vec<ClassId> {
        let seeds = self.type_set(TypeSetKind::AllExternalTypes);
        let mut seen: BTreeSet<ClassId> = seeds.ids().iter().copied().collect();
        let mut queue: Vec<ClassId> = seeds.ids().to_vec();
        while let Some(id) = queue.pop() {
            let mut names = BTreeSet::new();
            referenced_type_names(self.universe.class(id), &mut names);
            for name in names {
                if let Some(next) = self.universe.id_of(&name)
                    && self.is_external(next)
                    && seen.insert(next)
                {
                    queue.push(next);
                }
            }
        }
        seen.into_iter().collect()
    }
}

/// Names of every class a declaration or body in `class` mentions.
pub fn referenced_type_names(class: &ClassEntity, out: &mut BTreeSet<String>) {
    out.extend(class.supertype_names().map(str::to_string));
    out.extend(class.annotations.iter().cloned());
    for field in &class.fields {
        push_type(&field.field_type, out);
        out.extend(field.annotations.iter().cloned());
    }
    for method in &class.methods {
        push_signature(&method.signature, out);
        out.extend(method.exceptions.iter().cloned());
        out.extend(method.annotations.iter().cloned());
        for symbol in method.referenced_symbols() {
            out.insert(symbol.owner().to_string());
            match symbol {
                ReferencedSymbol::Type { .. } => {}
                ReferencedSymbol::Field { descriptor, .. } => {
                    if let Ok(ty) = TypeDescriptor::parse(descriptor) {
                        push_type(&ty, out);
                    }
                }
                ReferencedSymbol::Method { descriptor, .. } => {
                    if let Ok(signature) = MethodDescriptor::parse(descriptor) {
                        push_signature(&signature, out);
                    }
                }
            }
        }
    }
}

fn push_signature(signature: &MethodDescriptor, out: &mut BTreeSet<String>) {
    for ty in signature
        .parameters
        .iter()
        .chain(std::iter::once(&signature.return_type))
    {
        push_type(ty, out);
    }
}

fn push_type(ty: &TypeDescriptor, out: &mut BTreeSet<String>) {
    if let Some(class) = ty.element_class() {
        out.insert(class.to_string());
    }
}
