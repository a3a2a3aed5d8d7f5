//! Emission context
//!
//! One context is threaded through the whole module-emission pass. All
//! reference tables are deduplicated here through name-keyed caches, so no
//! generator ever holds its own shared mutable dictionary.

use rustc_hash::FxHashMap;
use tala_metadata::{AttributeRecord, MemberRef, Module, TypeDef, TypeIndex, TypeRef};

/// Builder state for the module being emitted.
pub struct EmitContext {
    module: Module,
    module_refs: FxHashMap<String, u32>,
    type_refs: FxHashMap<(u32, String), u32>,
    member_refs: FxHashMap<(TypeIndex, String, String), u32>,
}

impl EmitContext {
    pub fn new(name: &str) -> Self {
        Self {
            module: Module::new(name),
            module_refs: FxHashMap::default(),
            type_refs: FxHashMap::default(),
            member_refs: FxHashMap::default(),
        }
    }

    /// Index of a module reference, adding it on first use.
    pub fn module_ref(&mut self, name: &str) -> u32 {
        if let Some(&index) = self.module_refs.get(name) {
            return index;
        }
        let index = self.module.module_refs.len() as u32;
        self.module.module_refs.push(name.to_string());
        self.module_refs.insert(name.to_string(), index);
        index
    }

    /// Reference to a type in another module, deduplicated by name.
    pub fn type_ref(&mut self, module: &str, name: &str) -> TypeIndex {
        let module_index = self.module_ref(module);
        let key = (module_index, name.to_string());
        if let Some(&index) = self.type_refs.get(&key) {
            return TypeIndex::Ref(index);
        }
        let index = self.module.type_refs.len() as u32;
        self.module.type_refs.push(TypeRef {
            module: module_index,
            name: name.to_string(),
        });
        self.type_refs.insert(key, index);
        TypeIndex::Ref(index)
    }

    /// Reference to a member of a type, deduplicated by owner, name and
    /// signature.
    pub fn member_ref(&mut self, owner: TypeIndex, name: &str, signature: &str) -> u32 {
        let key = (owner, name.to_string(), signature.to_string());
        if let Some(&index) = self.member_refs.get(&key) {
            return index;
        }
        let index = self.module.member_refs.len() as u32;
        self.module.member_refs.push(MemberRef {
            owner,
            name: name.to_string(),
            signature: signature.to_string(),
        });
        self.member_refs.insert(key, index);
        index
    }

    /// Index the next added type definition will receive.
    pub fn next_type_index(&self) -> u32 {
        self.module.types.len() as u32
    }

    /// Add a type definition, returning its index.
    pub fn add_type(&mut self, ty: TypeDef) -> u32 {
        self.module.types.push(ty);
        (self.module.types.len() - 1) as u32
    }

    /// Attach an attribute record to an already-added type.
    pub fn add_type_attribute(&mut self, type_index: u32, record: AttributeRecord) {
        self.module.types[type_index as usize].attributes.push(record);
    }

    /// Attach a module-level attribute record.
    pub fn add_module_attribute(&mut self, record: AttributeRecord) {
        self.module.attributes.push(record);
    }

    /// Finish the pass and hand back the module.
    pub fn finish(self) -> Module {
        self.module
    }
}
