//! Peer scanner
//!
//! Two phases over the input module list:
//!   Phase 1: read and decode each module file, dropping the file as soon
//!            as its bytes are parsed; unreadable or corrupt modules are
//!            skipped with a diagnostic.
//!   Phase 2: classify types against the in-memory set, which allows
//!            cross-module lookups (implemented interfaces, invokers).
//!
//! A type is a peer iff it carries a `Tala.Interop.Register` record or an
//! Android-component-style record exposing a `Name` field. Malformed
//! record blobs are "no match", never an error.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use tala_metadata::{Module, ParsedRecord, TypeDef, TypeIndex};
use tracing::{debug, warn};

use crate::diagnostics::Diagnostics;
use crate::mangle::{parse_signature, JniType};
use crate::names;
use crate::peer::{MarshalMethodRecord, PeerCatalog, PeerDescriptor};

/// A decoded module set with by-name lookup.
struct ModuleSet {
    modules: Vec<Module>,
    by_name: FxHashMap<String, usize>,
}

impl ModuleSet {
    fn load(paths: &[PathBuf], diags: &mut Diagnostics) -> Self {
        let mut modules = Vec::new();
        let mut by_name = FxHashMap::default();

        for path in paths {
            // Scoped acquisition: the file contents are dropped at the end
            // of this iteration whether or not decoding succeeds
            let module = match load_module(path) {
                Ok(module) => module,
                Err(message) => {
                    warn!("skipping module {}: {message}", path.display());
                    diags.warn(format!("skipped module {}: {message}", path.display()));
                    continue;
                }
            };
            if !by_name.contains_key(&module.name) {
                by_name.insert(module.name.clone(), modules.len());
                modules.push(module);
            }
        }

        Self { modules, by_name }
    }

    fn get(&self, name: &str) -> Option<&Module> {
        self.by_name.get(name).map(|&i| &self.modules[i])
    }
}

fn load_module(path: &Path) -> Result<Module, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    Module::decode(&bytes).map_err(|e| e.to_string())
}

/// Scan the given module files and build the peer catalogue.
///
/// Per-module failures are recorded and skipped; the scan itself never
/// fails.
pub fn scan_modules(paths: &[PathBuf], diags: &mut Diagnostics) -> PeerCatalog {
    let set = ModuleSet::load(paths, diags);
    let mut peers = Vec::new();

    for module in &set.modules {
        if !module.uses_module(names::INTEROP_MODULE) {
            debug!("module {} does not use {}, skipping", module.name, names::INTEROP_MODULE);
            continue;
        }
        for ty in &module.types {
            if let Some(peer) = classify_type(&set, module, ty) {
                debug!("found peer {} -> {}", peer.managed_name, peer.jni_name);
                peers.push(peer);
            }
        }
    }

    PeerCatalog::new(peers)
}

/// Registration data extracted from a type's attribute records.
struct Registration {
    jni_name: String,
    connector: Option<String>,
    no_wrapper: bool,
}

fn classify_type(set: &ModuleSet, module: &Module, ty: &TypeDef) -> Option<PeerDescriptor> {
    let registration = type_registration(module, ty)?;

    let invoker_type = if ty.is_interface() || ty.is_abstract() {
        find_invoker(module, ty, registration.connector.as_deref())
    } else {
        None
    };

    let base_managed = if ty.is_interface() {
        None
    } else {
        ty.base.and_then(|base| resolve_type_name(module, base))
    };

    let (methods, constructors, native_interfaces) = collect_marshal_methods(set, module, ty);

    Some(PeerDescriptor {
        jni_name: registration.jni_name,
        managed_name: ty.name.clone(),
        module: module.name.clone(),
        is_interface: ty.is_interface(),
        is_abstract: ty.is_abstract(),
        no_wrapper: registration.no_wrapper,
        invoker_type,
        base_managed,
        base_jni_name: None,
        has_activation_ctor: has_activation_ctor(ty),
        activation_ancestor: None,
        methods,
        constructors,
        native_interfaces,
    })
}

/// The name of the attribute type a record invokes.
fn attribute_type_name<'a>(module: &'a Module, index: TypeIndex) -> Option<&'a str> {
    match index {
        TypeIndex::Def(i) => module.types.get(i as usize).map(|t| t.name.as_str()),
        TypeIndex::Ref(i) => module.type_refs.get(i as usize).map(|r| r.name.as_str()),
    }
}

fn type_registration(module: &Module, ty: &TypeDef) -> Option<Registration> {
    for attr in &ty.attributes {
        let Some(attr_name) = attribute_type_name(module, attr.ctor_type) else {
            continue;
        };

        if attr_name == names::REGISTER_ATTRIBUTE {
            let Some(record) = ParsedRecord::parse(&attr.blob) else {
                continue;
            };
            let jni_name = record.string(0)?;
            if jni_name.is_empty() {
                return None;
            }
            return Some(Registration {
                jni_name: jni_name.to_string(),
                connector: record.string(2).map(str::to_string),
                no_wrapper: record.named_bool(names::NO_WRAPPER_FIELD).unwrap_or(false),
            });
        }

        if names::COMPONENT_ATTRIBUTES.contains(&attr_name) {
            let Some(record) = ParsedRecord::parse(&attr.blob) else {
                continue;
            };
            if let Some(name) = record.named_str(names::NAME_FIELD) {
                return Some(Registration {
                    jni_name: name.replace('.', "/"),
                    connector: None,
                    no_wrapper: false,
                });
            }
        }
    }
    None
}

/// Invoker lookup for interface/abstract peers: the registration record's
/// connector-type argument wins; convention (`{Type}Invoker` sibling in the
/// same module) is the fallback.
fn find_invoker(module: &Module, ty: &TypeDef, connector: Option<&str>) -> Option<String> {
    if let Some(connector) = connector {
        let type_name = connector.split(',').next().unwrap_or("").trim();
        if !type_name.is_empty() {
            return Some(type_name.to_string());
        }
    }

    let candidate = format!("{}Invoker", ty.name);
    if module.find_type(&candidate).is_some() {
        return Some(candidate);
    }
    None
}

/// Resolve a type index to (full name, module name).
fn resolve_type_name(module: &Module, index: TypeIndex) -> Option<(String, String)> {
    match index {
        TypeIndex::Def(i) => {
            let ty = module.types.get(i as usize)?;
            Some((ty.name.clone(), module.name.clone()))
        }
        TypeIndex::Ref(i) => {
            let type_ref = module.type_refs.get(i as usize)?;
            let module_name = module.module_refs.get(type_ref.module as usize)?;
            Some((type_ref.name.clone(), module_name.clone()))
        }
    }
}

fn has_activation_ctor(ty: &TypeDef) -> bool {
    ty.methods.iter().any(|m| {
        m.is_ctor()
            && m.param_types.len() == 2
            && m.param_types[0] == names::NATIVE_HANDLE
            && m.param_types[1] == names::OWNERSHIP_TRANSFER
    })
}

/// Kotlin-style mangled names (`-impl` suffix or a hyphen eight characters
/// from the end) cannot be overridden from Java.
fn is_unoverridable_name(jni_name: &str) -> bool {
    if jni_name.contains("-impl") {
        return true;
    }
    let bytes = jni_name.as_bytes();
    bytes.len() > 7 && bytes[bytes.len() - 8] == b'-'
}

fn collect_marshal_methods(
    set: &ModuleSet,
    module: &Module,
    ty: &TypeDef,
) -> (Vec<MarshalMethodRecord>, Vec<MarshalMethodRecord>, Vec<String>) {
    let mut methods = Vec::new();
    let mut constructors = Vec::new();
    let mut interfaces = Vec::new();
    let mut seen: Vec<(String, String)> = Vec::new();

    // Methods registered directly on the type
    for method in &ty.methods {
        if let Some(record) = marshal_from_attributes(module, &method.attributes, None) {
            push_marshal(record, &mut methods, &mut constructors, &mut seen);
        }
    }

    // Interface-implementor case: registered methods on implemented
    // interfaces also qualify, with the callback owned by the interface
    // (or whatever its connector names)
    for &iface in &ty.interfaces {
        let Some((iface_name, iface_module_name)) = resolve_type_name(module, iface) else {
            continue;
        };
        let Some(iface_module) = set.get(&iface_module_name) else {
            continue;
        };
        let Some(iface_ty) = iface_module.find_type(&iface_name) else {
            continue;
        };

        if let Some(registration) = type_registration(iface_module, iface_ty) {
            if !interfaces.contains(&registration.jni_name) {
                interfaces.push(registration.jni_name);
            }
        }

        let owner = (iface_name.clone(), iface_module_name.clone());
        for method in &iface_ty.methods {
            if let Some(record) =
                marshal_from_attributes(iface_module, &method.attributes, Some(&owner))
            {
                push_marshal(record, &mut methods, &mut constructors, &mut seen);
            }
        }
    }

    (methods, constructors, interfaces)
}

fn push_marshal(
    record: MarshalMethodRecord,
    methods: &mut Vec<MarshalMethodRecord>,
    constructors: &mut Vec<MarshalMethodRecord>,
    seen: &mut Vec<(String, String)>,
) {
    let key = (record.jni_name.clone(), record.jni_signature.clone());
    if seen.contains(&key) {
        return;
    }
    seen.push(key);
    if record.jni_name == "<init>" {
        constructors.push(record);
    } else {
        methods.push(record);
    }
}

/// Build a marshal record from a method's attribute records, when it is
/// registered. `interface_owner` marks methods collected from implemented
/// interfaces; their callbacks default to the interface type.
fn marshal_from_attributes(
    module: &Module,
    attributes: &[tala_metadata::AttributeRecord],
    interface_owner: Option<&(String, String)>,
) -> Option<MarshalMethodRecord> {
    for attr in attributes {
        if attribute_type_name(module, attr.ctor_type) != Some(names::REGISTER_ATTRIBUTE) {
            continue;
        }
        let Some(record) = ParsedRecord::parse(&attr.blob) else {
            continue;
        };

        // Marshal methods need all three fixed arguments
        let jni_name = record.string(0)?;
        let jni_signature = record.string(1)?;
        let connector = record.string(2)?;
        if jni_name.is_empty() || jni_signature.is_empty() || connector.is_empty() {
            return None;
        }
        if jni_name == "<clinit>" || is_unoverridable_name(jni_name) {
            return None;
        }

        let (params, return_type) = parse_signature(jni_signature)
            .unwrap_or_else(|| (Vec::new(), JniType::Void));

        let (callback_name, connector_type) = parse_connector(connector, jni_name);
        let callback_type = connector_type.or_else(|| interface_owner.cloned());

        return Some(MarshalMethodRecord {
            jni_name: jni_name.to_string(),
            jni_signature: jni_signature.to_string(),
            callback_name,
            params,
            return_type,
            callback_type,
        });
    }
    None
}

/// Parse a connector string.
///
/// The convention is `Get<Name>Handler[:<Type>, <Module>, ...]`; the
/// callback symbol is `n_<Name>`. Connectors outside the convention fall
/// back to `n_<jni-name>`.
fn parse_connector(connector: &str, jni_name: &str) -> (String, Option<(String, String)>) {
    let (method_part, type_part) = match connector.split_once(':') {
        Some((method, rest)) => (method, Some(rest)),
        None => (connector, None),
    };

    let callback_name = method_part
        .strip_prefix("Get")
        .and_then(|rest| rest.find("Handler").map(|end| &rest[..end]))
        .filter(|name| !name.is_empty())
        .map(|name| format!("n_{name}"))
        .unwrap_or_else(|| format!("n_{jni_name}"));

    let callback_type = type_part.and_then(|rest| {
        let mut parts = rest.splitn(3, ',');
        let type_name = parts.next()?.trim();
        let module_name = parts.next()?.trim();
        if type_name.is_empty() || module_name.is_empty() {
            return None;
        }
        Some((type_name.replace('/', "+"), module_name.to_string()))
    });

    (callback_name, callback_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::TestModule;

    #[test]
    fn module_without_interop_reference_is_skipped() {
        let mut builder = TestModule::standalone("App.Standalone");
        builder.add_peer_class("App.Standalone.X", "com/example/X", &[]);
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        assert!(catalog.peers.is_empty());
    }

    #[test]
    fn register_record_names_a_peer() {
        let mut builder = TestModule::new("App.Main");
        builder.add_peer_class("App.Main.MainActivity", "com/example/MainActivity", &[]);
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        assert_eq!(catalog.peers.len(), 1);
        let peer = &catalog.peers[0];
        assert_eq!(peer.jni_name, "com/example/MainActivity");
        assert_eq!(peer.managed_name, "App.Main.MainActivity");
        assert!(!peer.no_wrapper);
    }

    #[test]
    fn component_record_name_converts_dots_to_slashes() {
        let mut builder = TestModule::new("App.Main");
        builder.add_component_class(
            "App.Main.HomeActivity",
            "Tala.Android.App.ActivityAttribute",
            "com.example.HomeActivity",
        );
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        assert_eq!(catalog.peers.len(), 1);
        assert_eq!(catalog.peers[0].jni_name, "com/example/HomeActivity");
    }

    #[test]
    fn malformed_record_blob_is_no_match() {
        let mut builder = TestModule::new("App.Main");
        let register = builder.register_attr_ref();
        let mut ty = plain_class("App.Main.Broken");
        ty.attributes.push(tala_metadata::AttributeRecord {
            ctor_type: register,
            blob: vec![0x09, 0x01, 0xFF, 0xFF, 0xFF],
        });
        builder.push_type(ty);
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        assert!(catalog.peers.is_empty());
    }

    #[test]
    fn activation_ctor_is_detected() {
        let mut builder = TestModule::new("App.Main");
        builder.add_peer_class("App.Main.A", "com/example/A", &[]);
        builder.add_activation_ctor("App.Main.A");
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        assert!(catalog.peers[0].has_activation_ctor);
    }

    #[test]
    fn marshal_method_callback_from_connector() {
        let mut builder = TestModule::new("App.Main");
        builder.add_peer_class("App.Main.MainActivity", "com/example/MainActivity", &[]);
        builder.add_marshal_method(
            "App.Main.MainActivity",
            "onCreate",
            "(Landroid/os/Bundle;)V",
            "GetOnCreate_Landroid_os_Bundle_Handler",
        );
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        let peer = &catalog.peers[0];
        assert_eq!(peer.methods.len(), 1);
        let method = &peer.methods[0];
        assert_eq!(method.callback_name, "n_OnCreate_Landroid_os_Bundle_");
        assert_eq!(method.callback_type, None);
        assert_eq!(method.params.len(), 1);
    }

    #[test]
    fn connector_type_part_names_the_callback_owner() {
        let (name, ty) = parse_connector(
            "GetOnClickHandler:Tala.Android.Views.View/IOnClickListenerInvoker, Tala.Android",
            "onClick",
        );
        assert_eq!(name, "n_OnClick");
        assert_eq!(
            ty,
            Some((
                "Tala.Android.Views.View+IOnClickListenerInvoker".to_string(),
                "Tala.Android".to_string()
            ))
        );
    }

    #[test]
    fn unconventional_connector_falls_back_to_jni_name() {
        let (name, ty) = parse_connector("SomethingElse", "onClick");
        assert_eq!(name, "n_onClick");
        assert_eq!(ty, None);
    }

    #[test]
    fn interface_methods_qualify_for_implementors() {
        let mut builder = TestModule::new("App.Main");
        let iface = builder.add_peer_interface(
            "App.Main.IOnTapListener",
            "com/example/IOnTapListener",
        );
        builder.add_marshal_method(
            "App.Main.IOnTapListener",
            "onTap",
            "()V",
            "GetOnTapHandler:App.Main.IOnTapListenerInvoker, App.Main",
        );
        builder.add_peer_class_implementing("App.Main.TapImplementor", "com/example/TapImplementor", iface);
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        let implementor = catalog.find_by_managed("App.Main.TapImplementor").unwrap();
        assert_eq!(implementor.methods.len(), 1);
        assert_eq!(implementor.methods[0].callback_name, "n_OnTap");
        assert_eq!(
            implementor.methods[0].callback_type,
            Some(("App.Main.IOnTapListenerInvoker".to_string(), "App.Main".to_string()))
        );
        assert_eq!(implementor.native_interfaces, vec!["com/example/IOnTapListener"]);
    }

    #[test]
    fn invoker_from_registration_connector() {
        let mut builder = TestModule::new("App.Main");
        builder.add_abstract_peer_with_connector(
            "App.Main.Animator",
            "android/animation/Animator",
            "App.Main.AnimatorInvoker, App.Main",
        );
        builder.add_peer_class("App.Main.Fade", "com/example/Fade", &[]);
        builder.set_base_ref("App.Main.Fade", "App.Main.Animator", "App.Main");
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        let animator = catalog.find_by_managed("App.Main.Animator").unwrap();
        assert!(animator.is_abstract);
        assert_eq!(animator.invoker_type.as_deref(), Some("App.Main.AnimatorInvoker"));

        let fade = catalog.find_by_managed("App.Main.Fade").unwrap();
        assert_eq!(
            fade.base_managed,
            Some(("App.Main.Animator".to_string(), "App.Main".to_string()))
        );
    }

    #[test]
    fn invoker_found_by_convention() {
        let mut builder = TestModule::new("App.Main");
        builder.add_peer_interface("App.Main.IWorker", "com/example/IWorker");
        builder.add_peer_class("App.Main.IWorkerInvoker", "com/example/IWorker", &[("NoWrapper", true)]);
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        let iface = catalog.find_by_managed("App.Main.IWorker").unwrap();
        assert_eq!(iface.invoker_type.as_deref(), Some("App.Main.IWorkerInvoker"));
        let invoker = catalog.find_by_managed("App.Main.IWorkerInvoker").unwrap();
        assert!(invoker.is_invoker());
    }

    #[test]
    fn clinit_and_kotlin_mangled_registrations_are_skipped() {
        assert!(is_unoverridable_name("hashCode-impl"));
        assert!(is_unoverridable_name("getValue-IimB9pc"));
        assert!(!is_unoverridable_name("onCreate"));

        let mut builder = TestModule::new("App.Main");
        builder.add_peer_class("App.Main.K", "com/example/K", &[]);
        builder.add_marshal_method("App.Main.K", "<clinit>", "()V", "GetClinitHandler");
        builder.add_marshal_method("App.Main.K", "box-impl", "()V", "GetBoxHandler");
        let module = builder.build();

        let mut diags = Diagnostics::new();
        let catalog = scan_in_memory(vec![module], &mut diags);
        assert!(catalog.peers[0].methods.is_empty());
        assert!(catalog.peers[0].constructors.is_empty());
    }

    /// Scan already-decoded modules (tests bypass the filesystem).
    fn scan_in_memory(modules: Vec<Module>, _diags: &mut Diagnostics) -> PeerCatalog {
        let mut by_name = FxHashMap::default();
        for (i, module) in modules.iter().enumerate() {
            by_name.insert(module.name.clone(), i);
        }
        let set = ModuleSet { modules, by_name };

        let mut peers = Vec::new();
        for module in &set.modules {
            if !module.uses_module(names::INTEROP_MODULE) {
                continue;
            }
            for ty in &module.types {
                if let Some(peer) = classify_type(&set, module, ty) {
                    peers.push(peer);
                }
            }
        }
        PeerCatalog::new(peers)
    }

    fn plain_class(name: &str) -> TypeDef {
        TypeDef {
            name: name.to_string(),
            flags: 0,
            base: None,
            interfaces: vec![],
            methods: vec![],
            attributes: vec![],
        }
    }
}
