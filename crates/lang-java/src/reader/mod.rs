//! ABI extraction from compiled class files.

mod collector;
mod signature;

use abiscope_core::error::{AbiscopeError, Result};
use abiscope_core::model::SourceFileAbi;
use abiscope_core::plugin::AbiReader;
use collector::{Collector, Visibility};
use ristretto_classfile::attributes::{AnnotationElement, AnnotationValuePair, Attribute, Instruction};
use ristretto_classfile::{ClassFile, Constant, FieldAccessFlags, FieldType, MethodAccessFlags};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::path::Path;

const ACC_PRIVATE: u16 = 0x0002;

/// Reads a top-level class file together with the class files of its nested types.
#[derive(Debug, Default, Clone, Copy)]
pub struct JavaAbiReader;

impl JavaAbiReader {
    pub fn new() -> Self {
        Self
    }
}

impl AbiReader for JavaAbiReader {
    fn parse_source_file_abi(&self, compiled_unit: &Path) -> Result<SourceFileAbi> {
        let bytes = std::fs::read(compiled_unit).map_err(|e| AbiscopeError::MalformedUnit {
            path: compiled_unit.to_path_buf(),
            reason: e.to_string(),
        })?;
        let root = parse_class_file(bytes, compiled_unit)?;
        let root_name = UnitReader::new(compiled_unit, &root)?.name;
        let source_file_name = source_file_name(&root);
        let dir = compiled_unit
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let mut collector = Collector::default();
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut inner_class_names = BTreeSet::new();
        let mut visited = HashSet::from([root_name.clone()]);
        let mut worklist = VecDeque::from([(compiled_unit.to_path_buf(), root)]);

        while let Some((path, class)) = worklist.pop_front() {
            let unit = UnitReader::new(&path, &class)?;
            for inner in unit.read(&root_name, &mut collector, &mut owners)? {
                if !visited.insert(inner.clone()) {
                    continue;
                }
                let inner_path = dir.join(format!("{}.class", simple_name(&inner)));
                inner_class_names.insert(inner);

                match std::fs::read(&inner_path) {
                    Ok(bytes) => {
                        let nested = parse_class_file(bytes, &inner_path)?;
                        worklist.push_back((inner_path, nested));
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        tracing::debug!("Nested class file {} is missing", inner_path.display());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let is_own = |name: &str| name == root_name || inner_class_names.contains(name);
        let normalize = |names: BTreeSet<String>| -> Vec<String> {
            names
                .iter()
                .map(|name| outermost(&owners, name))
                .filter(|name| !is_own(*name))
                .map(str::to_string)
                .collect()
        };

        let (public, private) = collector.into_sets();
        let abi = SourceFileAbi::new(root_name.clone(), normalize(public), normalize(private))
            .with_inner_class_names(inner_class_names.iter().cloned());
        Ok(match source_file_name {
            Some(name) => abi.with_source_file_name(name),
            None => abi,
        })
    }
}

fn parse_class_file(bytes: Vec<u8>, path: &Path) -> Result<ClassFile> {
    ClassFile::from_bytes(&mut Cursor::new(bytes)).map_err(|e| AbiscopeError::MalformedUnit {
        path: path.to_path_buf(),
        reason: format!("{e:?}"),
    })
}

fn source_file_name(class: &ClassFile) -> Option<String> {
    class.attributes.iter().find_map(|attribute| match attribute {
        Attribute::SourceFile {
            source_file_index, ..
        } => class
            .constant_pool
            .try_get_utf8(*source_file_index)
            .ok()
            .map(|name| name.to_string()),
        _ => None,
    })
}

fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('/').next().unwrap_or(class_name)
}

/// Follows `InnerClasses` ownership up to the top-level declaring type.
fn outermost<'a>(owners: &'a HashMap<String, String>, class_name: &'a str) -> &'a str {
    let mut current = class_name;
    for _ in 0..=owners.len() {
        match owners.get(current) {
            Some(outer) => current = outer,
            None => break,
        }
    }
    current
}

/// Visits one class file, feeding its references to the shared collector.
struct UnitReader<'a> {
    path: &'a Path,
    class: &'a ClassFile,
    name: String,
}

impl<'a> UnitReader<'a> {
    fn new(path: &'a Path, class: &'a ClassFile) -> Result<Self> {
        let mut reader = Self {
            path,
            class,
            name: String::new(),
        };
        reader.name = reader.class_ref(class.this_class)?;
        Ok(reader)
    }

    /// Collects every reference of this unit and returns the names of the nested types of
    /// `root_name` listed in its `InnerClasses` table.
    fn read(
        &self,
        root_name: &str,
        collector: &mut Collector,
        owners: &mut HashMap<String, String>,
    ) -> Result<Vec<String>> {
        let nested_prefix = format!("{root_name}$");
        let mut nested = Vec::new();
        let mut is_private = false;

        for attribute in &self.class.attributes {
            let Attribute::InnerClasses { classes, .. } = attribute else {
                continue;
            };
            for entry in classes {
                let inner = self.class_ref(entry.class_info_index)?;
                if entry.outer_class_info_index != 0 {
                    owners.insert(inner.clone(), self.class_ref(entry.outer_class_info_index)?);
                }
                if inner == self.name {
                    is_private = entry.access_flags.bits() & ACC_PRIVATE != 0;
                } else if inner.starts_with(&nested_prefix) {
                    nested.push(inner);
                }
            }
        }

        let visibility = Visibility::of(is_private);
        if self.class.super_class != 0 {
            collector.add(visibility, &self.class_ref(self.class.super_class)?);
        }
        for &interface in &self.class.interfaces {
            collector.add(visibility, &self.class_ref(interface)?);
        }
        self.read_attributes(&self.class.attributes, visibility, collector)?;

        for field in &self.class.fields {
            let visibility = Visibility::of(field.access_flags.contains(FieldAccessFlags::PRIVATE));
            collector.add_field_type(visibility, &field.field_type);
            self.read_attributes(&field.attributes, visibility, collector)?;
        }

        for method in &self.class.methods {
            let visibility =
                Visibility::of(method.access_flags.contains(MethodAccessFlags::PRIVATE));
            let descriptor = self.utf8(method.descriptor_index)?;
            let (parameters, return_type) = FieldType::parse_method_descriptor(&descriptor)
                .map_err(|e| self.malformed(format!("method descriptor {descriptor}: {e:?}")))?;
            for parameter in &parameters {
                collector.add_field_type(visibility, parameter);
            }
            if let Some(return_type) = &return_type {
                collector.add_field_type(visibility, return_type);
            }
            self.read_attributes(&method.attributes, visibility, collector)?;
        }

        Ok(nested)
    }

    fn read_attributes(
        &self,
        attributes: &[Attribute],
        visibility: Visibility,
        collector: &mut Collector,
    ) -> Result<()> {
        for attribute in attributes {
            match attribute {
                Attribute::Signature {
                    signature_index, ..
                } => {
                    let signature = self.utf8(*signature_index)?;
                    collector
                        .add_signature(visibility, &signature)
                        .map_err(|e| self.malformed(e))?;
                }
                Attribute::Exceptions {
                    exception_indexes, ..
                } => {
                    for &index in exception_indexes {
                        collector.add(visibility, &self.class_ref(index)?);
                    }
                }
                Attribute::RuntimeVisibleAnnotations { annotations, .. } => {
                    for annotation in annotations {
                        self.read_annotation(
                            annotation.type_index,
                            &annotation.elements,
                            visibility,
                            collector,
                        )?;
                    }
                }
                Attribute::RuntimeVisibleParameterAnnotations {
                    parameter_annotations,
                    ..
                } => {
                    for parameter in parameter_annotations {
                        for annotation in &parameter.annotations {
                            self.read_annotation(
                                annotation.type_index,
                                &annotation.elements,
                                visibility,
                                collector,
                            )?;
                        }
                    }
                }
                Attribute::RuntimeVisibleTypeAnnotations {
                    type_annotations, ..
                } => {
                    for annotation in type_annotations {
                        self.read_annotation(
                            annotation.type_index,
                            &annotation.elements,
                            visibility,
                            collector,
                        )?;
                    }
                }
                Attribute::Code {
                    code, attributes, ..
                } => {
                    // Method bodies never leak into the ABI.
                    for instruction in code {
                        let Some(class_name) = self.referenced_class(instruction)? else {
                            continue;
                        };
                        collector
                            .add_class_constant(Visibility::Private, &class_name)
                            .map_err(|e| self.malformed(e))?;
                    }
                    self.read_attributes(attributes, Visibility::Private, collector)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn read_annotation(
        &self,
        type_index: u16,
        elements: &[AnnotationValuePair],
        visibility: Visibility,
        collector: &mut Collector,
    ) -> Result<()> {
        let descriptor = self.utf8(type_index)?;
        collector
            .add_signature(visibility, &descriptor)
            .map_err(|e| self.malformed(e))?;
        for pair in elements {
            self.read_element(&pair.value, visibility, collector)?;
        }
        Ok(())
    }

    fn read_element(
        &self,
        element: &AnnotationElement,
        visibility: Visibility,
        collector: &mut Collector,
    ) -> Result<()> {
        match element {
            AnnotationElement::Enum {
                type_name_index, ..
            } => {
                let descriptor = self.utf8(*type_name_index)?;
                collector
                    .add_signature(visibility, &descriptor)
                    .map_err(|e| self.malformed(e))?;
            }
            AnnotationElement::Class { class_info_index } => {
                let descriptor = self.utf8(*class_info_index)?;
                collector
                    .add_signature(visibility, &descriptor)
                    .map_err(|e| self.malformed(e))?;
            }
            AnnotationElement::Annotation { annotation } => {
                self.read_annotation(
                    annotation.type_index,
                    &annotation.elements,
                    visibility,
                    collector,
                )?;
            }
            AnnotationElement::Array { values } => {
                for value in values {
                    self.read_element(value, visibility, collector)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Class constant an instruction names, either directly or as the owner of the
    /// field or method it accesses.
    fn referenced_class(&self, instruction: &Instruction) -> Result<Option<String>> {
        let index = match instruction {
            Instruction::New(index)
            | Instruction::Anewarray(index)
            | Instruction::Checkcast(index)
            | Instruction::Instanceof(index)
            | Instruction::Multianewarray(index, _) => *index,
            Instruction::Getstatic(index)
            | Instruction::Putstatic(index)
            | Instruction::Getfield(index)
            | Instruction::Putfield(index)
            | Instruction::Invokevirtual(index)
            | Instruction::Invokespecial(index)
            | Instruction::Invokestatic(index)
            | Instruction::Invokeinterface(index, _) => return self.member_owner(*index).map(Some),
            Instruction::Ldc(index) => return self.loaded_class(u16::from(*index)),
            Instruction::Ldc_w(index) => return self.loaded_class(*index),
            _ => return Ok(None),
        };
        self.class_ref(index).map(Some)
    }

    fn member_owner(&self, index: u16) -> Result<String> {
        match self.class.constant_pool.try_get(index) {
            Ok(
                Constant::FieldRef { class_index, .. }
                | Constant::MethodRef { class_index, .. }
                | Constant::InterfaceMethodRef { class_index, .. },
            ) => self.class_ref(*class_index),
            Ok(other) => Err(self.malformed(format!("constant #{index} is not a member: {other:?}"))),
            Err(e) => Err(self.malformed(format!("member constant #{index}: {e:?}"))),
        }
    }

    /// `ldc` also loads numbers and strings, only class literals count.
    fn loaded_class(&self, index: u16) -> Result<Option<String>> {
        match self.class.constant_pool.try_get(index) {
            Ok(Constant::Class(_)) => self.class_ref(index).map(Some),
            Ok(_) => Ok(None),
            Err(e) => Err(self.malformed(format!("constant #{index}: {e:?}"))),
        }
    }

    fn utf8(&self, index: u16) -> Result<String> {
        self.class
            .constant_pool
            .try_get_utf8(index)
            .map(|value| value.to_string())
            .map_err(|e| self.malformed(format!("constant #{index}: {e:?}")))
    }

    fn class_ref(&self, index: u16) -> Result<String> {
        self.class
            .constant_pool
            .try_get_class(index)
            .map(|value| value.to_string())
            .map_err(|e| self.malformed(format!("class constant #{index}: {e:?}")))
    }

    fn malformed(&self, reason: impl Into<String>) -> AbiscopeError {
        AbiscopeError::MalformedUnit {
            path: self.path.to_path_buf(),
            reason: reason.into(),
        }
    }
}
