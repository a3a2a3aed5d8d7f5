//! Test-only helpers for building scannable modules in memory.

use tala_metadata::{
    method_flags, type_flags, AttributeRecord, MethodDef, Module, RecordBlobBuilder, TypeDef,
    TypeIndex, TypeRef,
};

use crate::names;

/// Builder for `.tlm` modules used as scanner/pipeline inputs.
pub struct TestModule {
    module: Module,
    register_ref: TypeIndex,
}

impl TestModule {
    /// A module that references the interop runtime module.
    pub fn new(name: &str) -> Self {
        Self::with_first_ref(name, names::INTEROP_MODULE)
    }

    /// A module that does NOT reference the interop runtime module.
    pub fn standalone(name: &str) -> Self {
        Self::with_first_ref(name, "Some.Other")
    }

    fn with_first_ref(name: &str, first_ref: &str) -> Self {
        let mut module = Module::new(name);
        module.module_refs.push(first_ref.to_string());
        module.type_refs.push(TypeRef {
            module: 0,
            name: names::REGISTER_ATTRIBUTE.to_string(),
        });
        Self {
            module,
            register_ref: TypeIndex::Ref(0),
        }
    }

    /// Type index of the registration attribute reference.
    pub fn register_attr_ref(&self) -> TypeIndex {
        self.register_ref
    }

    pub fn push_type(&mut self, ty: TypeDef) -> TypeIndex {
        self.module.types.push(ty);
        TypeIndex::Def((self.module.types.len() - 1) as u32)
    }

    fn register_blob(jni_name: &str, named_bools: &[(&str, bool)]) -> Vec<u8> {
        let mut builder = RecordBlobBuilder::new().fixed_str(jni_name);
        for (name, value) in named_bools {
            builder = builder.named_bool(*name, *value);
        }
        builder.build()
    }

    fn registered_type(&self, name: &str, flags: u32, blob: Vec<u8>) -> TypeDef {
        TypeDef {
            name: name.to_string(),
            flags,
            base: None,
            interfaces: vec![],
            methods: vec![],
            attributes: vec![AttributeRecord {
                ctor_type: self.register_ref,
                blob,
            }],
        }
    }

    /// Add a class peer with a `Register` record.
    pub fn add_peer_class(
        &mut self,
        name: &str,
        jni_name: &str,
        named_bools: &[(&str, bool)],
    ) -> TypeIndex {
        let blob = Self::register_blob(jni_name, named_bools);
        let ty = self.registered_type(name, 0, blob);
        self.push_type(ty)
    }

    /// Add a class peer implementing an interface.
    pub fn add_peer_class_implementing(
        &mut self,
        name: &str,
        jni_name: &str,
        iface: TypeIndex,
    ) -> TypeIndex {
        let blob = Self::register_blob(jni_name, &[]);
        let mut ty = self.registered_type(name, 0, blob);
        ty.interfaces.push(iface);
        self.push_type(ty)
    }

    /// Add an interface peer.
    pub fn add_peer_interface(&mut self, name: &str, jni_name: &str) -> TypeIndex {
        let blob = Self::register_blob(jni_name, &[]);
        let ty = self.registered_type(name, type_flags::INTERFACE | type_flags::ABSTRACT, blob);
        self.push_type(ty)
    }

    /// Add an abstract class peer whose registration carries an invoker
    /// connector.
    pub fn add_abstract_peer_with_connector(
        &mut self,
        name: &str,
        jni_name: &str,
        connector: &str,
    ) -> TypeIndex {
        let blob = RecordBlobBuilder::new()
            .fixed_str(jni_name)
            .fixed_null()
            .fixed_str(connector)
            .build();
        let ty = self.registered_type(name, type_flags::ABSTRACT, blob);
        self.push_type(ty)
    }

    /// Add a component-attributed class (`Name` property carries the
    /// dotted Java name).
    pub fn add_component_class(&mut self, name: &str, attr_type: &str, dotted_name: &str) {
        self.module.type_refs.push(TypeRef {
            module: 0,
            name: attr_type.to_string(),
        });
        let ctor_type = TypeIndex::Ref((self.module.type_refs.len() - 1) as u32);
        let blob = RecordBlobBuilder::new()
            .named_str(names::NAME_FIELD, dotted_name)
            .build();
        let ty = TypeDef {
            name: name.to_string(),
            flags: 0,
            base: None,
            interfaces: vec![],
            methods: vec![],
            attributes: vec![AttributeRecord { ctor_type, blob }],
        };
        self.push_type(ty);
    }

    /// Give a type a base (by managed name; external reference).
    pub fn set_base_ref(&mut self, type_name: &str, base_name: &str, base_module: &str) {
        let module_index = self.module_ref(base_module);
        self.module.type_refs.push(TypeRef {
            module: module_index,
            name: base_name.to_string(),
        });
        let base = TypeIndex::Ref((self.module.type_refs.len() - 1) as u32);
        let ty = self.find_type_mut(type_name);
        ty.base = Some(base);
    }

    /// Add an activation constructor `(NativeHandle, OwnershipTransfer)`.
    pub fn add_activation_ctor(&mut self, type_name: &str) {
        let ty = self.find_type_mut(type_name);
        ty.methods.push(MethodDef {
            name: ".ctor".to_string(),
            flags: method_flags::CTOR,
            param_types: vec![
                names::NATIVE_HANDLE.to_string(),
                names::OWNERSHIP_TRANSFER.to_string(),
            ],
            return_type: "void".to_string(),
            body: None,
            attributes: vec![],
        });
    }

    /// Add a registered method (3-argument `Register` record).
    pub fn add_marshal_method(
        &mut self,
        type_name: &str,
        jni_name: &str,
        signature: &str,
        connector: &str,
    ) {
        let register_ref = self.register_ref;
        let ty = self.find_type_mut(type_name);
        let blob = RecordBlobBuilder::new()
            .fixed_str(jni_name)
            .fixed_str(signature)
            .fixed_str(connector)
            .build();
        ty.methods.push(MethodDef {
            name: jni_name.to_string(),
            flags: method_flags::VIRTUAL,
            param_types: vec![],
            return_type: "void".to_string(),
            body: None,
            attributes: vec![AttributeRecord {
                ctor_type: register_ref,
                blob,
            }],
        });
    }

    fn module_ref(&mut self, name: &str) -> u32 {
        if let Some(i) = self.module.module_refs.iter().position(|m| m == name) {
            return i as u32;
        }
        self.module.module_refs.push(name.to_string());
        (self.module.module_refs.len() - 1) as u32
    }

    fn find_type_mut(&mut self, name: &str) -> &mut TypeDef {
        self.module
            .types
            .iter_mut()
            .find(|t| t.name == name)
            .unwrap_or_else(|| panic!("test module has no type named {name}"))
    }

    pub fn build(self) -> Module {
        self.module
    }
}
