#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Bytecode for test methods; class and member names are internal (`a/b/C`).
#[derive(Debug, Clone)]
pub enum Op {
    Aload(u8),
    InvokeSpecial(&'static str, &'static str, &'static str),
    InvokeVirtual(&'static str, &'static str, &'static str),
    InvokeStatic(&'static str, &'static str, &'static str),
    GetField(&'static str, &'static str, &'static str),
    New(&'static str),
    CheckCast(&'static str),
    Dup,
    Pop,
    AconstNull,
    Return,
    AReturn,
}

/// Minimal class-file writer producing version 52 classes.
pub struct ClassWriter {
    entries: Vec<Vec<u8>>,
    index: BTreeMap<Vec<u8>, u16>,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
}

impl ClassWriter {
    pub fn class(name: &str, superclass: &str) -> Self {
        Self::with_access(name, Some(superclass), ACC_PUBLIC | ACC_SUPER)
    }

    pub fn interface(name: &str) -> Self {
        Self::with_access(
            name,
            Some("java/lang/Object"),
            ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT,
        )
    }

    fn with_access(name: &str, superclass: Option<&str>, access: u16) -> Self {
        let mut writer = Self {
            entries: Vec::new(),
            index: BTreeMap::new(),
            access,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        writer.this_class = writer.class_ref(name);
        if let Some(superclass) = superclass {
            writer.super_class = writer.class_ref(superclass);
        }
        writer
    }

    pub fn implements(mut self, interface: &str) -> Self {
        let index = self.class_ref(interface);
        self.interfaces.push(index);
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str) -> Self {
        let mut out = Vec::new();
        out.extend(access.to_be_bytes());
        out.extend(self.utf8(name).to_be_bytes());
        out.extend(self.utf8(descriptor).to_be_bytes());
        out.extend(0u16.to_be_bytes());
        self.fields.push(out);
        self
    }

    pub fn abstract_method(mut self, name: &str, descriptor: &str) -> Self {
        let out = self.method_header(ACC_PUBLIC | ACC_ABSTRACT, name, descriptor, 0);
        self.methods.push(out);
        self
    }

    pub fn method(mut self, access: u16, name: &str, descriptor: &str, ops: &[Op]) -> Self {
        let mut code = Vec::new();
        for op in ops {
            self.encode(op, &mut code);
        }
        let mut out = self.method_header(access, name, descriptor, 1);
        let code_name = self.utf8("Code");
        out.extend(code_name.to_be_bytes());
        let length = 2 + 2 + 4 + code.len() + 2 + 2;
        out.extend((length as u32).to_be_bytes());
        out.extend(8u16.to_be_bytes());
        out.extend(8u16.to_be_bytes());
        out.extend((code.len() as u32).to_be_bytes());
        out.extend(code);
        out.extend(0u16.to_be_bytes());
        out.extend(0u16.to_be_bytes());
        self.methods.push(out);
        self
    }

    /// `public <init>()V` calling the superclass constructor.
    pub fn default_constructor(self, superclass: &'static str) -> Self {
        self.method(
            ACC_PUBLIC,
            "<init>",
            "()V",
            &[Op::Aload(0), Op::InvokeSpecial(superclass, "<init>", "()V"), Op::Return],
        )
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(0xCAFE_BABEu32.to_be_bytes());
        out.extend(0u16.to_be_bytes());
        out.extend(52u16.to_be_bytes());
        out.extend(((self.entries.len() + 1) as u16).to_be_bytes());
        for entry in &self.entries {
            out.extend(entry);
        }
        out.extend(self.access.to_be_bytes());
        out.extend(self.this_class.to_be_bytes());
        out.extend(self.super_class.to_be_bytes());
        out.extend((self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend(interface.to_be_bytes());
        }
        out.extend((self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            out.extend(field);
        }
        out.extend((self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend(method);
        }
        out.extend(0u16.to_be_bytes());
        out
    }

    fn method_header(&mut self, access: u16, name: &str, descriptor: &str, attributes: u16) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend(access.to_be_bytes());
        out.extend(self.utf8(name).to_be_bytes());
        out.extend(self.utf8(descriptor).to_be_bytes());
        out.extend(attributes.to_be_bytes());
        out
    }

    fn encode(&mut self, op: &Op, code: &mut Vec<u8>) {
        match op {
            Op::Aload(0) => code.push(0x2a),
            Op::Aload(1) => code.push(0x2b),
            Op::Aload(local) => code.extend([0x19, *local]),
            Op::InvokeSpecial(owner, name, descriptor) => {
                let index = self.member_ref(10, owner, name, descriptor);
                code.push(0xb7);
                code.extend(index.to_be_bytes());
            }
            Op::InvokeVirtual(owner, name, descriptor) => {
                let index = self.member_ref(10, owner, name, descriptor);
                code.push(0xb6);
                code.extend(index.to_be_bytes());
            }
            Op::InvokeStatic(owner, name, descriptor) => {
                let index = self.member_ref(10, owner, name, descriptor);
                code.push(0xb8);
                code.extend(index.to_be_bytes());
            }
            Op::GetField(owner, name, descriptor) => {
                let index = self.member_ref(9, owner, name, descriptor);
                code.push(0xb4);
                code.extend(index.to_be_bytes());
            }
            Op::New(class) => {
                let index = self.class_ref(class);
                code.push(0xbb);
                code.extend(index.to_be_bytes());
            }
            Op::CheckCast(class) => {
                let index = self.class_ref(class);
                code.push(0xc0);
                code.extend(index.to_be_bytes());
            }
            Op::Dup => code.push(0x59),
            Op::Pop => code.push(0x57),
            Op::AconstNull => code.push(0x01),
            Op::Return => code.push(0xb1),
            Op::AReturn => code.push(0xb0),
        }
    }

    fn intern(&mut self, entry: Vec<u8>) -> u16 {
        if let Some(&index) = self.index.get(&entry) {
            return index;
        }
        self.entries.push(entry.clone());
        let index = self.entries.len() as u16;
        self.index.insert(entry, index);
        index
    }

    fn utf8(&mut self, text: &str) -> u16 {
        let mut entry = vec![1];
        entry.extend((text.len() as u16).to_be_bytes());
        entry.extend(text.as_bytes());
        self.intern(entry)
    }

    fn class_ref(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        let mut entry = vec![7];
        entry.extend(name.to_be_bytes());
        self.intern(entry)
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class = self.class_ref(owner);
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut name_and_type = vec![12];
        name_and_type.extend(name.to_be_bytes());
        name_and_type.extend(descriptor.to_be_bytes());
        let name_and_type = self.intern(name_and_type);
        let mut entry = vec![tag];
        entry.extend(class.to_be_bytes());
        entry.extend(name_and_type.to_be_bytes());
        self.intern(entry)
    }
}

pub fn write_jar(path: &Path, entries: &[(String, Vec<u8>)]) -> anyhow::Result<()> {
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

fn entry(name: &str, writer: ClassWriter) -> (String, Vec<u8>) {
    (format!("{name}.class"), writer.build())
}

/// A slice of the host API: public `Task`/`Plugin`/`DefaultTask` on top of
/// an internal `AbstractTask`.
pub fn gradle_api_entries() -> Vec<(String, Vec<u8>)> {
    vec![
        entry(
            "org/gradle/api/Task",
            ClassWriter::interface("org/gradle/api/Task")
                .abstract_method("getDescription", "()Ljava/lang/String;"),
        ),
        entry(
            "org/gradle/api/Plugin",
            ClassWriter::interface("org/gradle/api/Plugin")
                .abstract_method("apply", "(Ljava/lang/Object;)V"),
        ),
        entry(
            "org/gradle/api/internal/AbstractTask",
            ClassWriter::class("org/gradle/api/internal/AbstractTask", "java/lang/Object")
                .implements("org/gradle/api/Task")
                .field(ACC_PRIVATE, "group", "Ljava/lang/String;")
                .default_constructor("java/lang/Object")
                .method(
                    ACC_PUBLIC,
                    "getDescription",
                    "()Ljava/lang/String;",
                    &[Op::AconstNull, Op::AReturn],
                )
                .method(
                    ACC_PUBLIC,
                    "setGroup",
                    "(Ljava/lang/String;)V",
                    &[Op::Return],
                ),
        ),
        entry(
            "org/gradle/api/DefaultTask",
            ClassWriter::class("org/gradle/api/DefaultTask", "org/gradle/api/internal/AbstractTask")
                .default_constructor("org/gradle/api/internal/AbstractTask"),
        ),
        entry(
            "org/gradle/api/internal/project/ProjectInternal",
            ClassWriter::interface("org/gradle/api/internal/project/ProjectInternal"),
        ),
    ]
}

/// A plugin jar with one well-behaved task and several hazards.
pub fn acme_plugin_entries() -> Vec<(String, Vec<u8>)> {
    vec![
        entry(
            "com/acme/GoodTask",
            ClassWriter::class("com/acme/GoodTask", "org/gradle/api/DefaultTask")
                .default_constructor("org/gradle/api/DefaultTask"),
        ),
        entry(
            "com/acme/BadTask",
            ClassWriter::class("com/acme/BadTask", "org/gradle/api/internal/AbstractTask"),
        ),
        entry(
            "com/acme/OverridingTask",
            ClassWriter::class("com/acme/OverridingTask", "org/gradle/api/DefaultTask")
                .method(
                    ACC_PUBLIC,
                    "getDescription",
                    "()Ljava/lang/String;",
                    &[
                        Op::Aload(0),
                        Op::InvokeSpecial(
                            "org/gradle/api/DefaultTask",
                            "getDescription",
                            "()Ljava/lang/String;",
                        ),
                        Op::AReturn,
                    ],
                )
                .method(
                    ACC_PUBLIC,
                    "setGroup",
                    "(Ljava/lang/String;)V",
                    &[
                        Op::Aload(0),
                        Op::Aload(1),
                        Op::InvokeVirtual("com/acme/OverridingTask", "log", "(Ljava/lang/String;)V"),
                        Op::Return,
                    ],
                )
                .method(ACC_PRIVATE, "log", "(Ljava/lang/String;)V", &[Op::Return]),
        ),
        entry(
            "com/acme/AcmePlugin",
            ClassWriter::class("com/acme/AcmePlugin", "java/lang/Object")
                .implements("org/gradle/api/Plugin")
                .method(
                    ACC_PUBLIC,
                    "apply",
                    "(Ljava/lang/Object;)V",
                    &[
                        Op::Aload(1),
                        Op::CheckCast("org/gradle/api/internal/project/ProjectInternal"),
                        Op::Pop,
                        Op::Return,
                    ],
                ),
        ),
    ]
}
