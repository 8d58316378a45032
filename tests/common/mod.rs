//! A tiny in-process JVM class file builder used by the integration tests.
//! No JDK/`javac` is assumed to be available; these bytes are hand-encoded
//! just far enough (JVMS §4) for the scanner/extractor to recover the
//! classes, methods, and dependency edges the tests assert on. The bodies
//! are not valid, verifiable bytecode — nothing here is ever executed by a
//! real JVM, only decoded by this crate's own reader.

use std::collections::HashMap;

const CONSTANT_UTF8: u8 = 1;
const CONSTANT_CLASS: u8 = 7;
const CONSTANT_NAME_AND_TYPE: u8 = 12;
const CONSTANT_METHODREF: u8 = 10;

/// A method call a built class's single method should emit as an
/// `invokevirtual` instruction (producing a `METHOD_CALL` dependency edge).
pub struct Call {
    pub owner_internal: String,
    pub name: String,
    pub descriptor: String,
}

impl Call {
    pub fn new(owner_internal: &str, name: &str, descriptor: &str) -> Self {
        Call { owner_internal: owner_internal.to_string(), name: name.to_string(), descriptor: descriptor.to_string() }
    }
}

#[derive(Default)]
struct ConstantPool {
    entries: Vec<u8>,
    count: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    nat_cache: HashMap<(String, String), u16>,
    methodref_cache: HashMap<(String, String, String), u16>,
}

impl ConstantPool {
    fn push_raw(&mut self, bytes: &[u8]) -> u16 {
        self.entries.extend_from_slice(bytes);
        self.count += 1;
        self.count
    }

    fn utf8(&mut self, s: &str) -> u16 {
        if let Some(&idx) = self.utf8_cache.get(s) {
            return idx;
        }
        let bytes = s.as_bytes();
        let mut raw = vec![CONSTANT_UTF8];
        raw.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        raw.extend_from_slice(bytes);
        let idx = self.push_raw(&raw);
        self.utf8_cache.insert(s.to_string(), idx);
        idx
    }

    fn class(&mut self, internal_name: &str) -> u16 {
        if let Some(&idx) = self.class_cache.get(internal_name) {
            return idx;
        }
        let name_idx = self.utf8(internal_name);
        let mut raw = vec![CONSTANT_CLASS];
        raw.extend_from_slice(&name_idx.to_be_bytes());
        let idx = self.push_raw(&raw);
        self.class_cache.insert(internal_name.to_string(), idx);
        idx
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let key = (name.to_string(), descriptor.to_string());
        if let Some(&idx) = self.nat_cache.get(&key) {
            return idx;
        }
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        let mut raw = vec![CONSTANT_NAME_AND_TYPE];
        raw.extend_from_slice(&name_idx.to_be_bytes());
        raw.extend_from_slice(&desc_idx.to_be_bytes());
        let idx = self.push_raw(&raw);
        self.nat_cache.insert(key, idx);
        idx
    }

    fn methodref(&mut self, owner_internal: &str, name: &str, descriptor: &str) -> u16 {
        let key = (owner_internal.to_string(), name.to_string(), descriptor.to_string());
        if let Some(&idx) = self.methodref_cache.get(&key) {
            return idx;
        }
        let class_idx = self.class(owner_internal);
        let nat_idx = self.name_and_type(name, descriptor);
        let mut raw = vec![CONSTANT_METHODREF];
        raw.extend_from_slice(&class_idx.to_be_bytes());
        raw.extend_from_slice(&nat_idx.to_be_bytes());
        let idx = self.push_raw(&raw);
        self.methodref_cache.insert(key, idx);
        idx
    }
}

/// Builds one hand-encoded `.class` file.
pub struct ClassBuilder {
    internal_name: String,
    super_internal_name: String,
    calls: Vec<Call>,
    main_method: bool,
}

impl ClassBuilder {
    /// `internal_name` is slash-separated, e.g. `com/a/web/UserController`.
    pub fn new(internal_name: &str) -> Self {
        ClassBuilder {
            internal_name: internal_name.to_string(),
            super_internal_name: "java/lang/Object".to_string(),
            calls: Vec::new(),
            main_method: false,
        }
    }

    pub fn calls(mut self, call: Call) -> Self {
        self.calls.push(call);
        self
    }

    pub fn with_main_method(mut self) -> Self {
        self.main_method = true;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut pool = ConstantPool::default();

        let this_class = pool.class(&self.internal_name);
        let super_class = pool.class(&self.super_internal_name);

        let method_name = pool.utf8("doWork");
        let method_descriptor = pool.utf8("()V");

        // `invokevirtual #idx` per call, then a bare `return`.
        let mut code = Vec::new();
        for call in &self.calls {
            let idx = pool.methodref(&call.owner_internal, &call.name, &call.descriptor);
            code.push(0xB6); // invokevirtual
            code.extend_from_slice(&idx.to_be_bytes());
        }
        code.push(0xB1); // return

        let code_attr_name = pool.utf8("Code");
        let mut code_body = Vec::new();
        code_body.extend_from_slice(&2u16.to_be_bytes()); // max_stack
        code_body.extend_from_slice(&1u16.to_be_bytes()); // max_locals
        code_body.extend_from_slice(&(code.len() as u32).to_be_bytes());
        code_body.extend_from_slice(&code);
        code_body.extend_from_slice(&0u16.to_be_bytes()); // exception_table_length
        code_body.extend_from_slice(&0u16.to_be_bytes()); // attributes_count

        let mut methods = Vec::new();
        methods.extend_from_slice(&1u16.to_be_bytes()); // methods_count

        let access_flags: u16 = if self.main_method { 0x0009 } else { 0x0002 }; // public static, or private
        let name_idx = if self.main_method { pool.utf8("main") } else { method_name };
        let desc_idx = if self.main_method { pool.utf8("([Ljava/lang/String;)V") } else { method_descriptor };

        methods.extend_from_slice(&access_flags.to_be_bytes());
        methods.extend_from_slice(&name_idx.to_be_bytes());
        methods.extend_from_slice(&desc_idx.to_be_bytes());
        methods.extend_from_slice(&1u16.to_be_bytes()); // attributes_count
        methods.extend_from_slice(&code_attr_name.to_be_bytes());
        methods.extend_from_slice(&(code_body.len() as u32).to_be_bytes());
        methods.extend_from_slice(&code_body);

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major (Java 8)

        out.extend_from_slice(&(pool.count + 1).to_be_bytes()); // constant_pool_count
        out.extend_from_slice(&pool.entries);

        out.extend_from_slice(&0x0021u16.to_be_bytes()); // access_flags: ACC_PUBLIC | ACC_SUPER
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());

        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        out.extend_from_slice(&0u16.to_be_bytes()); // fields_count
        out.extend_from_slice(&methods);
        out.extend_from_slice(&0u16.to_be_bytes()); // attributes_count

        out
    }
}

/// Write a built class's bytes to `dir/<simple-name>.class`, mirroring the
/// package path (e.g. `com/a/web/UserController.class`).
pub fn write_class(dir: &std::path::Path, internal_name: &str, bytes: &[u8]) {
    let path = dir.join(format!("{internal_name}.class"));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}
