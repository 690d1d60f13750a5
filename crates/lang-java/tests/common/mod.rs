//! Minimal class-file assembler for reader tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SUPER: u16 = 0x0020;

pub const TARGET_FIELD: u8 = 0x13;
pub const TARGET_METHOD_RETURN: u8 = 0x14;

/// Annotation element values, see JVMS 4.7.16.1.
pub enum Element {
    Enum { descriptor: String, constant: String },
    Class(String),
    Annotation(Annotation),
    Array(Vec<Element>),
    Str(String),
}

pub struct Annotation {
    pub descriptor: String,
    pub elements: Vec<(String, Element)>,
}

impl Annotation {
    pub fn marker(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            elements: Vec::new(),
        }
    }

    pub fn with(mut self, name: &str, element: Element) -> Self {
        self.elements.push((name.to_string(), element));
        self
    }
}

pub struct InnerClass<'a> {
    pub inner: &'a str,
    pub outer: Option<&'a str>,
    pub simple_name: Option<&'a str>,
    pub access_flags: u16,
}

pub struct ClassFileBuilder {
    name: String,
    pool: Vec<Vec<u8>>,
    utf8s: HashMap<String, u16>,
    classes: HashMap<String, u16>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

impl ClassFileBuilder {
    pub fn new(name: &str) -> Self {
        let mut builder = Self {
            name: name.to_string(),
            pool: Vec::new(),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(name);
        builder.super_class = builder.class("java/lang/Object");
        builder
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        if let Some(&index) = self.utf8s.get(value) {
            return index;
        }
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(value.len() as u16).to_be_bytes());
        entry.extend_from_slice(value.as_bytes());
        self.pool.push(entry);
        let index = self.pool.len() as u16;
        self.utf8s.insert(value.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.classes.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_index.to_be_bytes());
        self.pool.push(entry);
        let index = self.pool.len() as u16;
        self.classes.insert(name.to_string(), index);
        index
    }

    fn member_ref(&mut self, tag: u8, owner: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(owner);
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut name_and_type = vec![12u8];
        name_and_type.extend_from_slice(&name_index.to_be_bytes());
        name_and_type.extend_from_slice(&descriptor_index.to_be_bytes());
        self.pool.push(name_and_type);
        let name_and_type_index = self.pool.len() as u16;

        let mut entry = vec![tag];
        entry.extend_from_slice(&class_index.to_be_bytes());
        entry.extend_from_slice(&name_and_type_index.to_be_bytes());
        self.pool.push(entry);
        self.pool.len() as u16
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(9, owner, name, descriptor)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(10, owner, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        self.member_ref(11, owner, name, descriptor)
    }

    pub fn string(&mut self, value: &str) -> u16 {
        let utf8_index = self.utf8(value);
        let mut entry = vec![8u8];
        entry.extend_from_slice(&utf8_index.to_be_bytes());
        self.pool.push(entry);
        self.pool.len() as u16
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_class = self.class(name);
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    pub fn field(mut self, access: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Self {
        let member = self.member(access, name, descriptor, attributes);
        self.fields.push(member);
        self
    }

    pub fn method(mut self, access: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Self {
        let member = self.member(access, name, descriptor, attributes);
        self.methods.push(member);
        self
    }

    pub fn attribute(mut self, attribute: Vec<u8>) -> Self {
        self.attributes.push(attribute);
        self
    }

    fn member(&mut self, access: u16, name: &str, descriptor: &str, attributes: Vec<Vec<u8>>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&access.to_be_bytes());
        out.extend_from_slice(&self.utf8(name).to_be_bytes());
        out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
        out.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
        for attribute in attributes {
            out.extend_from_slice(&attribute);
        }
        out
    }

    fn wrap(&mut self, name: &str, info: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.utf8(name).to_be_bytes());
        out.extend_from_slice(&(info.len() as u32).to_be_bytes());
        out.extend_from_slice(&info);
        out
    }

    pub fn signature_attr(&mut self, signature: &str) -> Vec<u8> {
        let index = self.utf8(signature);
        self.wrap("Signature", index.to_be_bytes().to_vec())
    }

    pub fn source_file_attr(&mut self, file_name: &str) -> Vec<u8> {
        let index = self.utf8(file_name);
        self.wrap("SourceFile", index.to_be_bytes().to_vec())
    }

    pub fn exceptions_attr(&mut self, exceptions: &[&str]) -> Vec<u8> {
        let mut info = (exceptions.len() as u16).to_be_bytes().to_vec();
        for exception in exceptions {
            info.extend_from_slice(&self.class(exception).to_be_bytes());
        }
        self.wrap("Exceptions", info)
    }

    pub fn inner_classes_attr(&mut self, entries: &[InnerClass]) -> Vec<u8> {
        let mut info = (entries.len() as u16).to_be_bytes().to_vec();
        for entry in entries {
            info.extend_from_slice(&self.class(entry.inner).to_be_bytes());
            let outer = entry.outer.map(|o| self.class(o)).unwrap_or(0);
            info.extend_from_slice(&outer.to_be_bytes());
            let simple = entry.simple_name.map(|n| self.utf8(n)).unwrap_or(0);
            info.extend_from_slice(&simple.to_be_bytes());
            info.extend_from_slice(&entry.access_flags.to_be_bytes());
        }
        self.wrap("InnerClasses", info)
    }

    pub fn annotations_attr(&mut self, annotations: &[Annotation]) -> Vec<u8> {
        let mut info = (annotations.len() as u16).to_be_bytes().to_vec();
        for annotation in annotations {
            let encoded = self.annotation(annotation);
            info.extend_from_slice(&encoded);
        }
        self.wrap("RuntimeVisibleAnnotations", info)
    }

    pub fn parameter_annotations_attr(&mut self, parameters: &[Vec<Annotation>]) -> Vec<u8> {
        let mut info = vec![parameters.len() as u8];
        for annotations in parameters {
            info.extend_from_slice(&(annotations.len() as u16).to_be_bytes());
            for annotation in annotations {
                let encoded = self.annotation(annotation);
                info.extend_from_slice(&encoded);
            }
        }
        self.wrap("RuntimeVisibleParameterAnnotations", info)
    }

    /// Type annotations whose target carries no target_info (field, method return).
    pub fn type_annotations_attr(&mut self, target_type: u8, annotations: &[Annotation]) -> Vec<u8> {
        let mut info = (annotations.len() as u16).to_be_bytes().to_vec();
        for annotation in annotations {
            info.push(target_type);
            info.push(0); // empty type_path
            let encoded = self.annotation(annotation);
            info.extend_from_slice(&encoded);
        }
        self.wrap("RuntimeVisibleTypeAnnotations", info)
    }

    /// A `Code` attribute that instantiates, casts, checks and allocates an array of the
    /// given classes, then returns.
    pub fn code_attr(&mut self, new: &str, checkcast: &str, instanceof: &str, anewarray: &str) -> Vec<u8> {
        let mut code = Vec::new();
        code.push(0xBB); // new
        code.extend_from_slice(&self.class(new).to_be_bytes());
        code.push(0x57); // pop
        code.push(0x01); // aconst_null
        code.push(0xC0); // checkcast
        code.extend_from_slice(&self.class(checkcast).to_be_bytes());
        code.push(0x57);
        code.push(0x01);
        code.push(0xC1); // instanceof
        code.extend_from_slice(&self.class(instanceof).to_be_bytes());
        code.push(0x57);
        code.push(0x03); // iconst_0
        code.push(0xBD); // anewarray
        code.extend_from_slice(&self.class(anewarray).to_be_bytes());
        code.push(0x57);
        code.push(0xB1); // return
        self.raw_code_attr(code)
    }

    /// Wraps already encoded bytecode into a `Code` attribute.
    pub fn raw_code_attr(&mut self, code: Vec<u8>) -> Vec<u8> {
        let mut info = Vec::new();
        info.extend_from_slice(&4u16.to_be_bytes()); // max_stack
        info.extend_from_slice(&1u16.to_be_bytes()); // max_locals
        info.extend_from_slice(&(code.len() as u32).to_be_bytes());
        info.extend_from_slice(&code);
        info.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
        info.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        self.wrap("Code", info)
    }

    fn annotation(&mut self, annotation: &Annotation) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.utf8(&annotation.descriptor).to_be_bytes());
        out.extend_from_slice(&(annotation.elements.len() as u16).to_be_bytes());
        for (name, element) in &annotation.elements {
            out.extend_from_slice(&self.utf8(name).to_be_bytes());
            let encoded = self.element(element);
            out.extend_from_slice(&encoded);
        }
        out
    }

    fn element(&mut self, element: &Element) -> Vec<u8> {
        let mut out = Vec::new();
        match element {
            Element::Enum {
                descriptor,
                constant,
            } => {
                out.push(b'e');
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
                out.extend_from_slice(&self.utf8(constant).to_be_bytes());
            }
            Element::Class(descriptor) => {
                out.push(b'c');
                out.extend_from_slice(&self.utf8(descriptor).to_be_bytes());
            }
            Element::Annotation(annotation) => {
                out.push(b'@');
                let encoded = self.annotation(annotation);
                out.extend_from_slice(&encoded);
            }
            Element::Array(values) => {
                out.push(b'[');
                out.extend_from_slice(&(values.len() as u16).to_be_bytes());
                for value in values {
                    let encoded = self.element(value);
                    out.extend_from_slice(&encoded);
                }
            }
            Element::Str(value) => {
                out.push(b's');
                out.extend_from_slice(&self.utf8(value).to_be_bytes());
            }
        }
        out
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE];
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major, Java 8
        out.extend_from_slice(&((self.pool.len() + 1) as u16).to_be_bytes());
        for entry in &self.pool {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&self.access_flags.to_be_bytes());
        out.extend_from_slice(&self.this_class.to_be_bytes());
        out.extend_from_slice(&self.super_class.to_be_bytes());

        out.extend_from_slice(&(self.interfaces.len() as u16).to_be_bytes());
        for interface in &self.interfaces {
            out.extend_from_slice(&interface.to_be_bytes());
        }
        for members in [&self.fields, &self.methods, &self.attributes] {
            out.extend_from_slice(&(members.len() as u16).to_be_bytes());
            for member in members {
                out.extend_from_slice(member);
            }
        }
        out
    }

    /// Writes `<dir>/<SimpleName>.class` and returns its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let simple = self.name.rsplit('/').next().unwrap_or(&self.name);
        let path = dir.join(format!("{simple}.class"));
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}
