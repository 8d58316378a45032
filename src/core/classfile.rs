//! Hand-rolled JVM class file decoder: constant pool, class/interface/field/
//! method tables, and the handful of attributes the extractor needs. No
//! classfile-parsing crate exists anywhere in the surrounding ecosystem this
//! crate draws from, so this is written directly against the format
//! (JVMS §4), the same way the rest of the engine hand-writes its own wire
//! formats where no crate covers them.

use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt};

use crate::api::error::{EngineError, EngineErrorKind};

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ENUM: u16 = 0x4000;

const CONSTANT_UTF8: u8 = 1;
const CONSTANT_INTEGER: u8 = 3;
const CONSTANT_FLOAT: u8 = 4;
const CONSTANT_LONG: u8 = 5;
const CONSTANT_DOUBLE: u8 = 6;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_STRING: u8 = 8;
const CONSTANT_FIELDREF: u8 = 9;
const CONSTANT_METHODREF: u8 = 10;
const CONSTANT_INTERFACE_METHODREF: u8 = 11;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHOD_HANDLE: u8 = 15;
const CONSTANT_METHOD_TYPE: u8 = 16;
const CONSTANT_DYNAMIC: u8 = 17;
const CONSTANT_INVOKE_DYNAMIC: u8 = 18;
const CONSTANT_MODULE: u8 = 19;
const CONSTANT_PACKAGE: u8 = 20;

/// One entry in the constant pool; only the fields extraction needs.
#[derive(Debug, Clone)]
pub enum Constant {
    Utf8(String),
    Integer,
    Float,
    Long,
    Double,
    Class { name_index: u16 },
    String,
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType,
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module,
    Package,
    /// The unused slot following a Long/Double entry (JVMS §4.4.5).
    Unusable,
}

/// A parsed `attributes` table entry; unrecognized attributes are skipped by
/// declared length and never reach this representation.
#[derive(Debug, Clone)]
pub enum Attribute {
    Code { exception_table: Vec<ExceptionTableEntry>, code: Vec<u8> },
    RuntimeAnnotations(Vec<AnnotationInfo>),
    SourceFile(String),
    Exceptions(Vec<u16>),
    BootstrapMethods(Vec<BootstrapMethod>),
}

/// One `BootstrapMethods` table entry (JVMS §4.7.23).
#[derive(Debug, Clone)]
pub struct BootstrapMethod {
    /// Constant pool index of the `CONSTANT_MethodHandle` driving this call site.
    pub method_ref: u16,
    /// Constant pool indices of the static bootstrap arguments.
    pub arguments: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct ExceptionTableEntry {
    pub catch_type_index: u16,
}

#[derive(Debug, Clone)]
pub struct AnnotationInfo {
    pub type_descriptor: String,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// A fully decoded class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: Vec<Constant>,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Resolve a `CONSTANT_Utf8` entry by its 1-based constant pool index.
    pub fn utf8(&self, index: u16) -> Option<&str> {
        match self.constant_pool.get(index as usize) {
            Some(Constant::Utf8(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Resolve a `CONSTANT_Class` entry to its internal (slash) name.
    pub fn class_name(&self, index: u16) -> Option<&str> {
        match self.constant_pool.get(index as usize) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            _ => None,
        }
    }

    /// Resolve a `NameAndType` entry to `(name, descriptor)`.
    pub fn name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.constant_pool.get(index as usize) {
            Some(Constant::NameAndType { name_index, descriptor_index }) => {
                Some((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            _ => None,
        }
    }

    /// Resolve a field/method-ref entry to `(owner internal name, name, descriptor)`.
    pub fn ref_triple(&self, index: u16) -> Option<(&str, &str, &str)> {
        let (class_index, nat_index) = match self.constant_pool.get(index as usize) {
            Some(Constant::Fieldref { class_index, name_and_type_index })
            | Some(Constant::Methodref { class_index, name_and_type_index })
            | Some(Constant::InterfaceMethodref { class_index, name_and_type_index }) => {
                (*class_index, *name_and_type_index)
            }
            _ => return None,
        };
        let owner = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Some((owner, name, descriptor))
    }

    /// Resolve an `invokedynamic` call site's `(name, descriptor)`.
    pub fn dynamic_name_and_type(&self, index: u16) -> Option<(&str, &str)> {
        match self.constant_pool.get(index as usize) {
            Some(Constant::InvokeDynamic { name_and_type_index, .. })
            | Some(Constant::Dynamic { name_and_type_index, .. }) => self.name_and_type(*name_and_type_index),
            _ => None,
        }
    }

    /// The bootstrap method table index for an `invokedynamic`/dynamic constant.
    pub fn bootstrap_method_attr_index(&self, index: u16) -> Option<u16> {
        match self.constant_pool.get(index as usize) {
            Some(Constant::InvokeDynamic { bootstrap_method_attr_index, .. })
            | Some(Constant::Dynamic { bootstrap_method_attr_index, .. }) => Some(*bootstrap_method_attr_index),
            _ => None,
        }
    }

    /// Resolve a `CONSTANT_MethodHandle` entry to the `(owner, name, descriptor)`
    /// of the field/method it references.
    pub fn method_handle_target(&self, index: u16) -> Option<(&str, &str, &str)> {
        match self.constant_pool.get(index as usize) {
            Some(Constant::MethodHandle { reference_index, .. }) => self.ref_triple(*reference_index),
            _ => None,
        }
    }

    /// The class's `BootstrapMethods` table, if present.
    pub fn bootstrap_methods(&self) -> Option<&[BootstrapMethod]> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::BootstrapMethods(v) => Some(v.as_slice()),
            _ => None,
        })
    }
}

struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { cursor: Cursor::new(bytes) }
    }

    fn u1(&mut self) -> std::io::Result<u8> {
        self.cursor.read_u8()
    }

    fn u2(&mut self) -> std::io::Result<u16> {
        self.cursor.read_u16::<BigEndian>()
    }

    fn u4(&mut self) -> std::io::Result<u32> {
        self.cursor.read_u32::<BigEndian>()
    }

    fn skip(&mut self, n: u64) -> std::io::Result<()> {
        let mut buf = vec![0u8; n as usize];
        self.cursor.read_exact(&mut buf)
    }

    fn bytes(&mut self, n: u32) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n as usize];
        self.cursor.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn io_err(e: std::io::Error) -> EngineError {
    EngineError::new(EngineErrorKind::ExtractorWarning, format!("truncated or malformed class file: {e}"))
}

/// Decode a class file from raw bytes.
pub fn decode(data: &[u8]) -> Result<ClassFile, EngineError> {
    let mut r = Reader::new(data);

    let magic = r.u4().map_err(io_err)?;
    if magic != 0xCAFEBABE {
        return Err(EngineError::new(EngineErrorKind::ExtractorWarning, "bad magic number"));
    }
    let minor_version = r.u2().map_err(io_err)?;
    let major_version = r.u2().map_err(io_err)?;

    let constant_pool = read_constant_pool(&mut r)?;

    let access_flags = r.u2().map_err(io_err)?;
    let this_class = r.u2().map_err(io_err)?;
    let super_class = r.u2().map_err(io_err)?;

    let interfaces_count = r.u2().map_err(io_err)?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        interfaces.push(r.u2().map_err(io_err)?);
    }

    let fields_count = r.u2().map_err(io_err)?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(read_field_or_method(&mut r, &constant_pool)?);
    }

    let methods_count = r.u2().map_err(io_err)?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(read_field_or_method(&mut r, &constant_pool)?);
    }

    let attributes = read_attributes(&mut r, &constant_pool)?;

    Ok(ClassFile {
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    })
}

fn read_constant_pool(r: &mut Reader) -> Result<Vec<Constant>, EngineError> {
    let count = r.u2().map_err(io_err)?;
    let mut pool = Vec::with_capacity(count as usize);
    pool.push(Constant::Unusable); // index 0 is never used

    let mut i = 1u16;
    while i < count {
        let tag = r.u1().map_err(io_err)?;
        let constant = match tag {
            CONSTANT_UTF8 => {
                let len = r.u2().map_err(io_err)?;
                let raw = r.bytes(len as u32).map_err(io_err)?;
                Constant::Utf8(String::from_utf8_lossy(&raw).into_owned())
            }
            CONSTANT_INTEGER => {
                r.skip(4).map_err(io_err)?;
                Constant::Integer
            }
            CONSTANT_FLOAT => {
                r.skip(4).map_err(io_err)?;
                Constant::Float
            }
            CONSTANT_LONG => {
                r.skip(8).map_err(io_err)?;
                Constant::Long
            }
            CONSTANT_DOUBLE => {
                r.skip(8).map_err(io_err)?;
                Constant::Double
            }
            CONSTANT_CLASS => Constant::Class { name_index: r.u2().map_err(io_err)? },
            CONSTANT_STRING => {
                r.skip(2).map_err(io_err)?;
                Constant::String
            }
            CONSTANT_FIELDREF => {
                let class_index = r.u2().map_err(io_err)?;
                let name_and_type_index = r.u2().map_err(io_err)?;
                Constant::Fieldref { class_index, name_and_type_index }
            }
            CONSTANT_METHODREF => {
                let class_index = r.u2().map_err(io_err)?;
                let name_and_type_index = r.u2().map_err(io_err)?;
                Constant::Methodref { class_index, name_and_type_index }
            }
            CONSTANT_INTERFACE_METHODREF => {
                let class_index = r.u2().map_err(io_err)?;
                let name_and_type_index = r.u2().map_err(io_err)?;
                Constant::InterfaceMethodref { class_index, name_and_type_index }
            }
            CONSTANT_NAME_AND_TYPE => {
                let name_index = r.u2().map_err(io_err)?;
                let descriptor_index = r.u2().map_err(io_err)?;
                Constant::NameAndType { name_index, descriptor_index }
            }
            CONSTANT_METHOD_HANDLE => {
                let reference_kind = r.u1().map_err(io_err)?;
                let reference_index = r.u2().map_err(io_err)?;
                Constant::MethodHandle { reference_kind, reference_index }
            }
            CONSTANT_METHOD_TYPE => {
                r.skip(2).map_err(io_err)?;
                Constant::MethodType
            }
            CONSTANT_DYNAMIC => {
                let bootstrap_method_attr_index = r.u2().map_err(io_err)?;
                let name_and_type_index = r.u2().map_err(io_err)?;
                Constant::Dynamic { bootstrap_method_attr_index, name_and_type_index }
            }
            CONSTANT_INVOKE_DYNAMIC => {
                let bootstrap_method_attr_index = r.u2().map_err(io_err)?;
                let name_and_type_index = r.u2().map_err(io_err)?;
                Constant::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index }
            }
            CONSTANT_MODULE => {
                r.skip(2).map_err(io_err)?;
                Constant::Module
            }
            CONSTANT_PACKAGE => {
                r.skip(2).map_err(io_err)?;
                Constant::Package
            }
            other => {
                return Err(EngineError::new(
                    EngineErrorKind::ExtractorWarning,
                    format!("unknown constant pool tag {other}"),
                ))
            }
        };
        let is_wide = matches!(constant, Constant::Long | Constant::Double);
        pool.push(constant);
        i += 1;
        if is_wide {
            pool.push(Constant::Unusable);
            i += 1;
        }
    }
    Ok(pool)
}

fn read_field_or_method(r: &mut Reader, pool: &[Constant]) -> Result<FieldInfo, EngineError> {
    let access_flags = r.u2().map_err(io_err)?;
    let name_index = r.u2().map_err(io_err)?;
    let descriptor_index = r.u2().map_err(io_err)?;
    let attributes = read_attributes(r, pool)?;
    Ok(FieldInfo { access_flags, name_index, descriptor_index, attributes })
}

fn utf8_at(pool: &[Constant], index: u16) -> Option<&str> {
    match pool.get(index as usize) {
        Some(Constant::Utf8(s)) => Some(s.as_str()),
        _ => None,
    }
}

fn read_attributes(r: &mut Reader, pool: &[Constant]) -> Result<Vec<Attribute>, EngineError> {
    let count = r.u2().map_err(io_err)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = r.u2().map_err(io_err)?;
        let length = r.u4().map_err(io_err)?;
        let name = utf8_at(pool, name_index).unwrap_or("");
        match name {
            "Code" => {
                let body = r.bytes(length).map_err(io_err)?;
                out.push(read_code_attribute(&body, pool)?);
            }
            "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
                let body = r.bytes(length).map_err(io_err)?;
                out.push(Attribute::RuntimeAnnotations(read_annotations(&body, pool)?));
            }
            "SourceFile" => {
                let body = r.bytes(length).map_err(io_err)?;
                let mut br = Reader::new(&body);
                let idx = br.u2().map_err(io_err)?;
                if let Some(s) = utf8_at(pool, idx) {
                    out.push(Attribute::SourceFile(s.to_string()));
                }
            }
            "Exceptions" => {
                let body = r.bytes(length).map_err(io_err)?;
                let mut br = Reader::new(&body);
                let n = br.u2().map_err(io_err)?;
                let mut types = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    types.push(br.u2().map_err(io_err)?);
                }
                out.push(Attribute::Exceptions(types));
            }
            "BootstrapMethods" => {
                let body = r.bytes(length).map_err(io_err)?;
                let mut br = Reader::new(&body);
                let n = br.u2().map_err(io_err)?;
                let mut methods = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    let method_ref = br.u2().map_err(io_err)?;
                    let arg_count = br.u2().map_err(io_err)?;
                    let mut arguments = Vec::with_capacity(arg_count as usize);
                    for _ in 0..arg_count {
                        arguments.push(br.u2().map_err(io_err)?);
                    }
                    methods.push(BootstrapMethod { method_ref, arguments });
                }
                out.push(Attribute::BootstrapMethods(methods));
            }
            // Signature and every other attribute (generics, debug info,
            // bootstrap methods already resolved above via the constant
            // pool, etc.) are intentionally skipped by declared length.
            _ => {
                r.skip(length as u64).map_err(io_err)?;
            }
        }
    }
    Ok(out)
}

fn read_code_attribute(body: &[u8], pool: &[Constant]) -> Result<Attribute, EngineError> {
    let mut r = Reader::new(body);
    let _max_stack = r.u2().map_err(io_err)?;
    let _max_locals = r.u2().map_err(io_err)?;
    let code_length = r.u4().map_err(io_err)?;
    let code = r.bytes(code_length).map_err(io_err)?;

    let exception_table_length = r.u2().map_err(io_err)?;
    let mut exception_table = Vec::with_capacity(exception_table_length as usize);
    for _ in 0..exception_table_length {
        let _start_pc = r.u2().map_err(io_err)?;
        let _end_pc = r.u2().map_err(io_err)?;
        let _handler_pc = r.u2().map_err(io_err)?;
        let catch_type_index = r.u2().map_err(io_err)?;
        exception_table.push(ExceptionTableEntry { catch_type_index });
    }

    // Nested attributes (LineNumberTable, LocalVariableTable, StackMapTable)
    // carry no architectural fact; skip them entirely.
    let _ = read_attributes(&mut r, pool)?;

    Ok(Attribute::Code { exception_table, code })
}

fn read_annotations(body: &[u8], pool: &[Constant]) -> Result<Vec<AnnotationInfo>, EngineError> {
    let mut r = Reader::new(body);
    let count = r.u2().map_err(io_err)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(read_annotation(&mut r, pool)?);
    }
    Ok(out)
}

fn read_annotation(r: &mut Reader, pool: &[Constant]) -> Result<AnnotationInfo, EngineError> {
    let type_index = r.u2().map_err(io_err)?;
    let type_descriptor = utf8_at(pool, type_index).unwrap_or("").to_string();
    let pairs = r.u2().map_err(io_err)?;
    for _ in 0..pairs {
        let _name_index = r.u2().map_err(io_err)?;
        skip_element_value(r, pool)?;
    }
    Ok(AnnotationInfo { type_descriptor })
}

fn skip_element_value(r: &mut Reader, pool: &[Constant]) -> Result<(), EngineError> {
    let tag = r.u1().map_err(io_err)?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => {
            r.skip(2).map_err(io_err)?;
        }
        b'e' => {
            r.skip(4).map_err(io_err)?;
        }
        b'@' => {
            read_annotation(r, pool)?;
        }
        b'[' => {
            let n = r.u2().map_err(io_err)?;
            for _ in 0..n {
                skip_element_value(r, pool)?;
            }
        }
        other => {
            return Err(EngineError::new(
                EngineErrorKind::ExtractorWarning,
                format!("unknown annotation element tag {other}"),
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_magic() {
        let err = decode(&[0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::ExtractorWarning);
    }

    #[test]
    fn rejects_truncated_input() {
        let err = decode(&[0xCA, 0xFE, 0xBA, 0xBE, 0, 0]).unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::ExtractorWarning);
    }
}
