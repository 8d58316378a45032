//! Turns a decoded [`classfile::ClassFile`] into the [`ClassFact`],
//! [`MethodRef`]/[`FieldRef`], and [`DependencyEdge`] facts the rest of the
//! engine reasons over.

use tracing::debug;

use crate::api::error::{EngineError, EngineErrorKind};
use crate::api::types::{
    ClassFact, DependencyEdge, EdgeKind, FieldRef, MethodRef, SourceLocation, TypeRef, Visibility,
};
use crate::core::classfile::{self, Attribute, ClassFile};

/// Everything extracted from one class.
pub struct ExtractedClass {
    pub fact: ClassFact,
    pub methods: Vec<MethodRef>,
    pub fields: Vec<FieldRef>,
    pub edges: Vec<DependencyEdge>,
}

/// Decode raw class bytes and extract facts. A malformed or truncated class
/// contributes nothing and is reported as a single [`EngineError`].
pub fn extract(bytes: &[u8], location: &SourceLocation) -> Result<ExtractedClass, EngineError> {
    let class = classfile::decode(bytes)?;
    let this_internal = class.class_name(class.this_class).ok_or_else(|| {
        EngineError::new(EngineErrorKind::ExtractorWarning, "class file has no resolvable this_class entry")
    })?;
    let this_ref = TypeRef::from_internal_name(this_internal);

    let mut edges = Vec::new();

    let super_fqn = if class.super_class == 0 {
        None
    } else {
        class.class_name(class.super_class).map(|s| {
            let to = TypeRef::from_internal_name(s);
            edges.push(make_edge(&this_ref, to.clone(), EdgeKind::Extends, None, location));
            to.fq_name
        })
    };

    let mut interface_fqns = Vec::with_capacity(class.interfaces.len());
    for &idx in &class.interfaces {
        if let Some(name) = class.class_name(idx) {
            let to = TypeRef::from_internal_name(name);
            edges.push(make_edge(&this_ref, to.clone(), EdgeKind::Implements, None, location));
            interface_fqns.push(to.fq_name);
        }
    }

    let annotation_fqns = collect_annotations(&class.attributes, &this_ref, None, &mut edges, location);

    let mut source_file = None;
    for attr in &class.attributes {
        if let Attribute::SourceFile(name) = attr {
            source_file = Some(name.clone());
        }
    }
    let mut full_location = location.clone();
    full_location.source_file = source_file;

    let mut methods = Vec::with_capacity(class.methods.len());
    let mut has_main_method = false;
    for m in &class.methods {
        let name = class.utf8(m.name_index).unwrap_or("").to_string();
        let descriptor = class.utf8(m.descriptor_index).unwrap_or("").to_string();
        if name == "main"
            && descriptor == "([Ljava/lang/String;)V"
            && m.access_flags & classfile::ACC_PUBLIC != 0
            && m.access_flags & classfile::ACC_STATIC != 0
        {
            has_main_method = true;
        }

        extract_method_type_edges(&this_ref, &descriptor, &name, &mut edges, &full_location);
        collect_annotations(&m.attributes, &this_ref, Some(&name), &mut edges, &full_location);
        extract_code_edges(&class, &m.attributes, &this_ref, &name, &mut edges, &full_location);

        methods.push(MethodRef {
            owner_fqn: this_ref.fq_name.clone(),
            name,
            descriptor,
            access_flags: m.access_flags,
        });
    }

    let mut fields = Vec::with_capacity(class.fields.len());
    for f in &class.fields {
        let name = class.utf8(f.name_index).unwrap_or("").to_string();
        let descriptor = class.utf8(f.descriptor_index).unwrap_or("").to_string();
        if let Some(ty) = descriptor_ref_type(&descriptor) {
            edges.push(make_edge(&this_ref, ty, EdgeKind::FieldType, None, &full_location));
        }
        collect_annotations(&f.attributes, &this_ref, Some(&name), &mut edges, &full_location);
        fields.push(FieldRef {
            owner_fqn: this_ref.fq_name.clone(),
            name,
            descriptor,
            access_flags: f.access_flags,
        });
    }

    let visibility = if class.access_flags & classfile::ACC_PUBLIC != 0 {
        Visibility::Public
    } else if class.access_flags & classfile::ACC_PROTECTED != 0 {
        Visibility::Protected
    } else if class.access_flags & classfile::ACC_PRIVATE != 0 {
        Visibility::Private
    } else {
        Visibility::Package
    };
    let is_interface = class.access_flags & classfile::ACC_INTERFACE != 0;
    let is_abstract = class.access_flags & classfile::ACC_ABSTRACT != 0 && !is_interface;
    let is_enum = class.access_flags & classfile::ACC_ENUM != 0;

    let fact = ClassFact {
        fq_name: this_ref.fq_name.clone(),
        package_name: this_ref.package_name.clone(),
        simple_name: this_ref.simple_name().to_string(),
        visibility,
        is_interface,
        is_abstract,
        is_enum,
        has_main_method,
        annotation_fqns,
        super_fqn,
        interface_fqns,
        method_count: methods.len() as u32,
        field_count: fields.len() as u32,
        class_file_version: (class.major_version, class.minor_version),
        location: full_location,
    };

    debug!(class = %fact.fq_name, edges = edges.len(), "extracted class facts");

    Ok(ExtractedClass { fact, methods, fields, edges })
}

fn make_edge(from: &TypeRef, to: TypeRef, kind: EdgeKind, detail: Option<String>, location: &SourceLocation) -> DependencyEdge {
    DependencyEdge { from: from.clone(), to, kind, detail, location: location.clone() }
}

/// Strip `L...;` / array-of-reference descriptors down to an internal-name
/// `TypeRef`; primitives and `V` yield `None`, arrays reduce to their
/// element type.
fn descriptor_ref_type(descriptor: &str) -> Option<TypeRef> {
    let mut d = descriptor;
    while let Some(rest) = d.strip_prefix('[') {
        d = rest;
    }
    if let Some(rest) = d.strip_prefix('L') {
        let name = rest.trim_end_matches(';');
        if name.is_empty() {
            return None;
        }
        return Some(TypeRef::from_internal_name(name));
    }
    None
}

/// Parse a method descriptor into parameter and return `TypeRef`s (primitives
/// and `void` omitted).
fn parse_method_descriptor(descriptor: &str) -> (Vec<TypeRef>, Option<TypeRef>) {
    let mut params = Vec::new();
    let bytes = descriptor.as_bytes();
    let mut i = 0usize;
    if bytes.first() != Some(&b'(') {
        return (params, None);
    }
    i += 1;
    while i < bytes.len() && bytes[i] != b')' {
        let (ty, next) = parse_one_descriptor(descriptor, i);
        if let Some(t) = ty {
            params.push(t);
        }
        i = next;
    }
    i += 1; // skip ')'
    let ret = if i < bytes.len() { parse_one_descriptor(descriptor, i).0 } else { None };
    (params, ret)
}

/// Parse one field-descriptor element starting at byte offset `start`,
/// returning the resolved type (if reference) and the offset just past it.
fn parse_one_descriptor(descriptor: &str, start: usize) -> (Option<TypeRef>, usize) {
    let bytes = descriptor.as_bytes();
    let mut i = start;
    let mut array_depth = 0;
    while i < bytes.len() && bytes[i] == b'[' {
        array_depth += 1;
        i += 1;
    }
    if i >= bytes.len() {
        return (None, i);
    }
    match bytes[i] {
        b'L' => {
            let end = descriptor[i..].find(';').map(|p| i + p + 1).unwrap_or(bytes.len());
            let name = &descriptor[i + 1..end.saturating_sub(1)];
            let ty = if name.is_empty() { None } else { Some(TypeRef::from_internal_name(name)) };
            (ty, end)
        }
        _ => {
            // primitive, or bare array-of-primitive: no reference type
            let _ = array_depth;
            (None, i + 1)
        }
    }
}

fn extract_method_type_edges(
    from: &TypeRef,
    descriptor: &str,
    _name: &str,
    edges: &mut Vec<DependencyEdge>,
    location: &SourceLocation,
) {
    let (params, ret) = parse_method_descriptor(descriptor);
    for p in params {
        edges.push(make_edge(from, p, EdgeKind::ParameterType, None, location));
    }
    if let Some(r) = ret {
        edges.push(make_edge(from, r, EdgeKind::ReturnType, None, location));
    }
}

fn collect_annotations(
    attributes: &[Attribute],
    from: &TypeRef,
    member_name: Option<&str>,
    edges: &mut Vec<DependencyEdge>,
    location: &SourceLocation,
) -> Vec<String> {
    let mut names = Vec::new();
    for attr in attributes {
        if let Attribute::RuntimeAnnotations(annos) = attr {
            for anno in annos {
                if let Some(ty) = descriptor_ref_type(&anno.type_descriptor) {
                    edges.push(make_edge(
                        from,
                        ty.clone(),
                        EdgeKind::AnnotationType,
                        member_name.map(|n| n.to_string()),
                        location,
                    ));
                    names.push(ty.fq_name);
                }
            }
        }
    }
    names
}

fn extract_code_edges(
    class: &ClassFile,
    attributes: &[Attribute],
    from: &TypeRef,
    method_name: &str,
    edges: &mut Vec<DependencyEdge>,
    location: &SourceLocation,
) {
    for attr in attributes {
        let (exception_table, code) = match attr {
            Attribute::Code { exception_table, code } => (exception_table, code),
            _ => continue,
        };

        for entry in exception_table {
            if entry.catch_type_index == 0 {
                continue; // `finally`/any-handler entry: no concrete type
            }
            if let Some(name) = class.class_name(entry.catch_type_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(name),
                    EdgeKind::Catch,
                    Some(method_name.to_string()),
                    location,
                ));
            }
        }

        for (opcode, pool_index) in scan_code_refs(code) {
            emit_instruction_edge(class, opcode, pool_index, from, method_name, edges, location);
        }
    }
}

fn emit_instruction_edge(
    class: &ClassFile,
    opcode: u8,
    pool_index: u16,
    from: &TypeRef,
    method_name: &str,
    edges: &mut Vec<DependencyEdge>,
    location: &SourceLocation,
) {
    match opcode {
        // getstatic, putstatic, getfield, putfield
        0xB2 | 0xB3 | 0xB4 | 0xB5 => {
            if let Some((owner, name, descriptor)) = class.ref_triple(pool_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(owner),
                    EdgeKind::FieldAccess,
                    Some(format!("{method_name}:{name}:{descriptor}")),
                    location,
                ));
            }
        }
        // invokevirtual, invokespecial, invokestatic, invokeinterface
        0xB6 | 0xB7 | 0xB8 | 0xB9 => {
            if let Some((owner, name, descriptor)) = class.ref_triple(pool_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(owner),
                    EdgeKind::MethodCall,
                    Some(format!("{method_name}:{name}:{descriptor}")),
                    location,
                ));
            }
        }
        // invokedynamic: resolve the lambda implementation target through the
        // BootstrapMethods table, when resolvable.
        0xBA => {
            if let Some((owner, name, descriptor)) = resolve_invokedynamic_target(class, pool_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(owner),
                    EdgeKind::MethodCall,
                    Some(format!("{method_name}:{name}:{descriptor}")),
                    location,
                ));
            }
        }
        // new
        0xBB => {
            if let Some(name) = class.class_name(pool_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(name),
                    EdgeKind::New,
                    Some(method_name.to_string()),
                    location,
                ));
            }
        }
        // anewarray, multianewarray
        0xBD | 0xC5 => {
            if let Some(name) = class.class_name(pool_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(name),
                    EdgeKind::New,
                    Some(method_name.to_string()),
                    location,
                ));
            }
        }
        // checkcast, instanceof
        0xC0 | 0xC1 => {
            if let Some(name) = class.class_name(pool_index) {
                edges.push(make_edge(
                    from,
                    TypeRef::from_internal_name(name),
                    EdgeKind::Instanceof,
                    Some(method_name.to_string()),
                    location,
                ));
            }
        }
        _ => {}
    }
}

/// Resolve an `invokedynamic` call site's synthetic implementation method via
/// the class's `BootstrapMethods` table: `arguments[1]` conventionally holds
/// the `MethodHandle` for a `LambdaMetafactory`-style call site.
fn resolve_invokedynamic_target<'a>(class: &'a ClassFile, pool_index: u16) -> Option<(&'a str, &'a str, &'a str)> {
    let bootstrap_index = class.bootstrap_method_attr_index(pool_index)?;
    let bootstrap_methods = class.bootstrap_methods()?;
    let bootstrap = bootstrap_methods.get(bootstrap_index as usize)?;
    let impl_arg_index = *bootstrap.arguments.get(1)?;
    class.method_handle_target(impl_arg_index)
}

/// Walk a method's bytecode, yielding `(opcode, constant_pool_index)` for
/// every instruction whose first operand is a constant-pool reference this
/// extractor cares about. Best-effort: malformed bytecode simply stops the
/// scan early rather than panicking.
fn scan_code_refs(code: &[u8]) -> Vec<(u8, u16)> {
    let mut out = Vec::new();
    let mut pos = 0usize;

    let read_u16 = |code: &[u8], at: usize| -> Option<u16> {
        code.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    };
    let read_i32 = |code: &[u8], at: usize| -> Option<i32> {
        code.get(at..at + 4).map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    };

    while pos < code.len() {
        let opcode = code[pos];
        let opcode_pos = pos;
        pos += 1;

        match opcode {
            0x10 | 0x12 | 0x15 | 0x16 | 0x17 | 0x18 | 0x19 | 0x36 | 0x37 | 0x38 | 0x39 | 0x3a | 0xbc | 0xa9 => {
                pos += 1;
            }
            0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 => {
                pos += 2;
            }
            0xb2 | 0xb3 | 0xb4 | 0xb5 | 0xb6 | 0xb7 | 0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1 => {
                match read_u16(code, pos) {
                    Some(idx) => out.push((opcode, idx)),
                    None => break,
                }
                pos += 2;
            }
            0xb9 | 0xba => {
                match read_u16(code, pos) {
                    Some(idx) => out.push((opcode, idx)),
                    None => break,
                }
                pos += 4;
            }
            0xc5 => {
                match read_u16(code, pos) {
                    Some(idx) => out.push((opcode, idx)),
                    None => break,
                }
                pos += 3;
            }
            0xc8 | 0xc9 => {
                pos += 4;
            }
            0xc4 => {
                // wide
                match code.get(pos) {
                    Some(&modified) => {
                        pos += 1;
                        pos += if modified == 0x84 { 4 } else { 2 };
                    }
                    None => break,
                }
            }
            0xaa => {
                // tableswitch
                let mut p = opcode_pos + 1;
                while p % 4 != 0 {
                    p += 1;
                }
                let (low, high) = match (read_i32(code, p + 4), read_i32(code, p + 8)) {
                    (Some(l), Some(h)) => (l, h),
                    _ => break,
                };
                let count = if high >= low { (high - low + 1) as usize } else { 0 };
                pos = p + 12 + count * 4;
            }
            0xab => {
                // lookupswitch
                let mut p = opcode_pos + 1;
                while p % 4 != 0 {
                    p += 1;
                }
                let npairs = match read_i32(code, p + 4) {
                    Some(n) if n >= 0 => n as usize,
                    _ => break,
                };
                pos = p + 8 + npairs * 8;
            }
            _ => {
                // every other opcode takes no operand bytes
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_ref_type_reduces_arrays_and_skips_primitives() {
        assert_eq!(descriptor_ref_type("I"), None);
        assert_eq!(descriptor_ref_type("[I"), None);
        assert_eq!(
            descriptor_ref_type("[[Ljava/lang/String;").map(|t| t.fq_name),
            Some("java.lang.String".to_string())
        );
    }

    #[test]
    fn parses_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(Ljava/lang/String;I[D)Ljava/util/List;");
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].fq_name, "java.lang.String");
        assert_eq!(ret.unwrap().fq_name, "java.util.List");
    }

    #[test]
    fn void_return_yields_no_type() {
        let (_, ret) = parse_method_descriptor("()V");
        assert!(ret.is_none());
    }
}
