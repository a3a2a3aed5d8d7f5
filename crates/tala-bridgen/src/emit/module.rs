//! Bridges module emitter
//!
//! Builds `_Tala.Android.Bridges` from empty state: one sealed proxy type
//! per peer, module-level type-map records, alias marker types, and the
//! self-referential proxy attribution the runtime uses for discovery.
//!
//! Trampoline index order is load-bearing: ordinary marshal methods first
//! in source order, then activation entries. The IR generator assumes the
//! same order without ever seeing this module.

use tala_metadata::{
    method_flags, type_flags, AttributeRecord, MethodBody, MethodDef, Module, Op,
    ProtectedRegion, RecordBlobBuilder, TypeDef, TypeIndex,
};

use crate::names;
use crate::peer::{MarshalMethodRecord, PeerCatalog, PeerDescriptor};

use super::context::EmitContext;

const NATIVE_HANDLE: &str = names::NATIVE_HANDLE;
const VOID: &str = "void";

/// Signature of an activation constructor.
fn activation_ctor_sig() -> String {
    format!("({},{}){}", NATIVE_HANDLE, names::OWNERSHIP_TRANSFER, VOID)
}

/// Signature of a native callback: pointer-sized env + receiver + one
/// pointer-sized slot per JNI parameter.
fn callback_sig(param_count: usize, returns_void: bool) -> String {
    let mut sig = String::from("(");
    for i in 0..param_count + 2 {
        if i > 0 {
            sig.push(',');
        }
        sig.push_str(NATIVE_HANDLE);
    }
    sig.push(')');
    sig.push_str(if returns_void { VOID } else { NATIVE_HANDLE });
    sig
}

fn qualified(name: &str, module: &str) -> String {
    format!("{name}, {module}")
}

fn bridges_type(short_name: &str) -> String {
    format!("{}.{}", names::BRIDGES_MODULE, short_name)
}

/// Emit the complete bridges module for a resolved catalogue.
pub fn emit_bridges_module(catalog: &PeerCatalog) -> Module {
    let mut ctx = EmitContext::new(names::BRIDGES_MODULE);
    // The interop and core modules are always referenced
    ctx.module_ref(names::INTEROP_MODULE);
    ctx.module_ref(names::CORE_MODULE);

    let mut type_map_records: Vec<(String, String, String)> = Vec::new();
    let mut association_records: Vec<(String, String)> = Vec::new();
    let mut emitted_markers: Vec<&str> = Vec::new();

    for (index, peer) in catalog.peers.iter().enumerate() {
        // Invokers share their interface's JNI name and are reachable only
        // through CreatePeer; no proxy, no type-map entry
        if peer.is_invoker() {
            continue;
        }

        let group = catalog.alias_group_of(index);
        let jni_entry = match group {
            Some(group) => {
                if !emitted_markers.contains(&group.marker_type_name.as_str()) {
                    emitted_markers.push(&group.marker_type_name);
                    emit_marker_type(&mut ctx, &group.marker_type_name);
                }
                let position = group.members.iter().position(|&m| m == index).unwrap_or(0);
                format!("{}[{}]", peer.jni_name, position)
            }
            None => peer.jni_name.clone(),
        };

        let proxy_name = peer.proxy_type_name();
        emit_proxy_type(&mut ctx, peer, &proxy_name);

        let target = qualified(&peer.managed_name, &peer.module);
        type_map_records.push((
            jni_entry,
            qualified(&bridges_type(&proxy_name), names::BRIDGES_MODULE),
            target.clone(),
        ));
        if let Some(group) = group {
            association_records.push((
                target,
                qualified(&bridges_type(&group.marker_type_name), names::BRIDGES_MODULE),
            ));
        }
    }

    let type_map_attr = ctx.type_ref(names::INTEROP_MODULE, names::TYPE_MAP_ATTRIBUTE);
    for (jni_entry, proxy, target) in type_map_records {
        let blob = RecordBlobBuilder::new()
            .fixed_str(jni_entry)
            .fixed_str(proxy)
            .fixed_str(target)
            .build();
        ctx.add_module_attribute(AttributeRecord {
            ctor_type: type_map_attr,
            blob,
        });
    }

    let association_attr =
        ctx.type_ref(names::INTEROP_MODULE, names::TYPE_MAP_ASSOCIATION_ATTRIBUTE);
    for (source, marker) in association_records {
        let blob = RecordBlobBuilder::new()
            .fixed_str(source)
            .fixed_str(marker)
            .build();
        ctx.add_module_attribute(AttributeRecord {
            ctor_type: association_attr,
            blob,
        });
    }

    ctx.finish()
}

/// Empty sealed marker type for an alias group.
fn emit_marker_type(ctx: &mut EmitContext, marker_name: &str) {
    let base = ctx.type_ref(names::CORE_MODULE, names::OBJECT_TYPE);
    ctx.add_type(TypeDef {
        name: bridges_type(marker_name),
        flags: type_flags::SEALED,
        base: Some(base),
        interfaces: vec![],
        methods: vec![],
        attributes: vec![],
    });
}

fn emit_proxy_type(ctx: &mut EmitContext, peer: &PeerDescriptor, proxy_name: &str) {
    let proxy_index = ctx.next_type_index();
    let proxy_base = ctx.type_ref(names::INTEROP_MODULE, names::PEER_PROXY);
    let target_type = ctx.type_ref(&peer.module, &peer.managed_name);

    let mut methods = Vec::new();
    methods.push(proxy_ctor(ctx, proxy_base));

    // Trampolines: ordinary marshal methods first (source order), then
    // activation entries; their method indices start at 1 (after .ctor)
    let mut trampoline_count = 0;
    if peer.needs_wrapper() {
        for (i, marshal) in peer.methods.iter().enumerate() {
            methods.push(ordinary_trampoline(ctx, peer, marshal, i));
            trampoline_count += 1;
        }
        for ctor_index in 0..peer.activation_count() {
            methods.push(activation_trampoline(ctx, ctor_index));
            trampoline_count += 1;
        }
    }

    methods.push(get_function_pointer(ctx, peer, proxy_index, trampoline_count));
    methods.push(create_peer(ctx, peer, target_type));

    let index = ctx.add_type(TypeDef {
        name: bridges_type(proxy_name),
        flags: type_flags::SEALED,
        base: Some(proxy_base),
        interfaces: vec![],
        methods,
        attributes: vec![],
    });
    debug_assert_eq!(index, proxy_index);

    // Self-referential attribution: the proxy applies itself so the
    // runtime can discover it without a separate manifest
    ctx.add_type_attribute(
        index,
        AttributeRecord {
            ctor_type: TypeIndex::Def(index),
            blob: RecordBlobBuilder::new().build(),
        },
    );
}

/// Trivial constructor delegating to the proxy base.
fn proxy_ctor(ctx: &mut EmitContext, proxy_base: TypeIndex) -> MethodDef {
    let base_ctor = ctx.member_ref(proxy_base, ".ctor", "()void");
    let mut body = MethodBody::new();
    body.push(Op::LoadArg(0));
    body.push(Op::Call(base_ctor));
    body.push(Op::Ret);
    MethodDef {
        name: ".ctor".to_string(),
        flags: method_flags::CTOR,
        param_types: vec![],
        return_type: VOID.to_string(),
        body: Some(body),
        attributes: vec![],
    }
}

/// Native-callable trampoline for one marshal method: call the callback
/// inside a protected region; a thrown error is converted to the native
/// exception representation, announced, and a zero sentinel returned.
fn ordinary_trampoline(
    ctx: &mut EmitContext,
    peer: &PeerDescriptor,
    marshal: &MarshalMethodRecord,
    index: usize,
) -> MethodDef {
    let returns_void = marshal.return_type.is_void();
    let arg_count = marshal.params.len() + 2;

    let (owner_name, owner_module) = marshal
        .callback_type
        .clone()
        .unwrap_or_else(|| (peer.managed_name.clone(), peer.module.clone()));
    let owner = ctx.type_ref(&owner_module, &owner_name);
    let callback = ctx.member_ref(
        owner,
        &marshal.callback_name,
        &callback_sig(marshal.params.len(), returns_void),
    );

    let body = protected_call_body(ctx, callback, arg_count, returns_void);

    MethodDef {
        name: format!("n_{}_mm_{}", marshal.jni_name, index),
        flags: method_flags::STATIC,
        param_types: vec![NATIVE_HANDLE.to_string(); arg_count],
        return_type: NATIVE_HANDLE.to_string(),
        body: Some(body),
        attributes: vec![],
    }
}

/// Activation trampoline: same protected shape around the runtime's
/// activation entry point; always returns the zero sentinel.
fn activation_trampoline(ctx: &mut EmitContext, ctor_index: usize) -> MethodDef {
    let runtime = ctx.type_ref(names::INTEROP_MODULE, names::ANDROID_RUNTIME);
    let activate = ctx.member_ref(runtime, names::ACTIVATE_PEER, &callback_sig(0, true));

    let body = protected_call_body(ctx, activate, 2, true);

    MethodDef {
        name: format!("nc_activate_{ctor_index}"),
        flags: method_flags::STATIC,
        param_types: vec![NATIVE_HANDLE.to_string(); 2],
        return_type: NATIVE_HANDLE.to_string(),
        body: Some(body),
        attributes: vec![],
    }
}

/// Protected region calling `callback` with `arg_count` arguments. On
/// success the pointer-sized result (a zero when the callback is void) is
/// returned; the handler converts the error, announces it, and returns the
/// zero sentinel.
fn protected_call_body(
    ctx: &mut EmitContext,
    callback: u32,
    arg_count: usize,
    returns_void: bool,
) -> MethodBody {
    let throwable = ctx.type_ref(names::INTEROP_MODULE, names::JAVA_THROWABLE);
    let from_error = ctx.member_ref(
        throwable,
        names::FROM_ERROR,
        &format!("({}){}", names::ERROR_TYPE, names::JAVA_THROWABLE),
    );
    let runtime = ctx.type_ref(names::INTEROP_MODULE, names::ANDROID_RUNTIME);
    let announce = ctx.member_ref(
        runtime,
        names::ANNOUNCE_UNHANDLED,
        &format!("({}){}", names::JAVA_THROWABLE, VOID),
    );
    let error_type = ctx.type_ref(names::CORE_MODULE, names::ERROR_TYPE);

    // Success path: 0..=leave, handler: the four ops after it, then Ret
    let success_ops = arg_count as u32 + 1 + u32::from(returns_void) + 1;
    let handler_start = success_ops;
    let handler_end = handler_start + 4;
    let end = handler_end;

    let mut body = MethodBody::new();
    for i in 0..arg_count {
        body.push(Op::LoadArg(i as u8));
    }
    body.push(Op::Call(callback));
    if returns_void {
        body.push(Op::LoadZeroNative);
    }
    body.push(Op::Leave(end));

    debug_assert_eq!(body.next_index(), handler_start);
    body.push(Op::Call(from_error));
    body.push(Op::Call(announce));
    body.push(Op::LoadZeroNative);
    body.push(Op::Leave(end));

    debug_assert_eq!(body.next_index(), end);
    body.push(Op::Ret);

    body.regions.push(ProtectedRegion {
        try_start: 0,
        try_end: handler_start,
        handler_start,
        handler_end,
        catch_type: error_type,
    });
    body
}

/// `GetFunctionPointer(index)`: linear compare-and-branch dispatch to the
/// trampolines, default null. Interface/abstract peers raise
/// unsupported-operation instead.
fn get_function_pointer(
    ctx: &mut EmitContext,
    peer: &PeerDescriptor,
    proxy_index: u32,
    trampoline_count: usize,
) -> MethodDef {
    let body = if peer.is_interface || peer.is_abstract {
        throw_unsupported_body(
            ctx,
            &format!(
                "{} is not native-callable for {}",
                names::GET_FUNCTION_POINTER,
                peer.managed_name
            ),
        )
    } else {
        let mut body = MethodBody::new();
        let n = trampoline_count as u32;
        // Default sits right after the n compare-and-branch triples; case
        // bodies are two ops each after the default
        for i in 0..n {
            body.push(Op::LoadArg(1));
            body.push(Op::LoadConstI32(i as i32));
            body.push(Op::BranchEq(3 * n + 2 + 2 * i));
        }
        body.push(Op::LoadZeroNative);
        body.push(Op::Ret);
        for i in 0..n {
            // Trampoline methods start at index 1, after .ctor
            body.push(Op::LoadFnPtr {
                type_def: proxy_index,
                method: 1 + i,
            });
            body.push(Op::Ret);
        }
        body
    };

    MethodDef {
        name: names::GET_FUNCTION_POINTER.to_string(),
        flags: method_flags::VIRTUAL,
        param_types: vec!["Tala.Core.Int32".to_string()],
        return_type: NATIVE_HANDLE.to_string(),
        body: Some(body),
        attributes: vec![],
    }
}

/// `CreatePeer(handle, transfer)`: own activation constructor, resolved
/// ancestor constructor on an uninitialized instance, invoker, or
/// unsupported-operation, in that order.
fn create_peer(ctx: &mut EmitContext, peer: &PeerDescriptor, target_type: TypeIndex) -> MethodDef {
    let body = if peer.has_activation_ctor {
        let ctor = ctx.member_ref(target_type, ".ctor", &activation_ctor_sig());
        let mut body = MethodBody::new();
        body.push(Op::LoadArg(1));
        body.push(Op::LoadArg(2));
        body.push(Op::NewObj(ctor));
        body.push(Op::Ret);
        body
    } else if let Some((ancestor_name, ancestor_module)) = &peer.activation_ancestor {
        // One ancestor constructor is shared by many proxies: the exact
        // peer type is materialized uninitialized and the constructor is
        // invoked on it as a plain instance call, not as construction
        let ancestor = ctx.type_ref(ancestor_module, ancestor_name);
        let ancestor_ctor = ctx.member_ref(ancestor, ".ctor", &activation_ctor_sig());
        let activation = ctx.type_ref(names::CORE_MODULE, names::ACTIVATION_HELPER);
        let get_uninitialized = ctx.member_ref(
            activation,
            names::GET_UNINITIALIZED,
            &format!("({}){}", names::TYPE_TYPE, names::OBJECT_TYPE),
        );
        let mut body = MethodBody::new();
        body.push(Op::LoadTypeToken(target_type));
        body.push(Op::Call(get_uninitialized));
        body.push(Op::CastClass(target_type));
        body.push(Op::Dup);
        body.push(Op::LoadArg(1));
        body.push(Op::LoadArg(2));
        body.push(Op::Call(ancestor_ctor));
        body.push(Op::Ret);
        body
    } else if let Some(invoker_name) = &peer.invoker_type {
        let invoker = ctx.type_ref(&peer.module, invoker_name);
        let invoker_ctor = ctx.member_ref(invoker, ".ctor", &activation_ctor_sig());
        let mut body = MethodBody::new();
        body.push(Op::LoadArg(1));
        body.push(Op::LoadArg(2));
        body.push(Op::NewObj(invoker_ctor));
        body.push(Op::Ret);
        body
    } else {
        throw_unsupported_body(
            ctx,
            &format!("No activation constructor found for {}", peer.managed_name),
        )
    };

    MethodDef {
        name: names::CREATE_PEER.to_string(),
        flags: method_flags::VIRTUAL,
        param_types: vec![
            NATIVE_HANDLE.to_string(),
            names::OWNERSHIP_TRANSFER.to_string(),
        ],
        return_type: "Tala.Android.IJavaPeer".to_string(),
        body: Some(body),
        attributes: vec![],
    }
}

fn throw_unsupported_body(ctx: &mut EmitContext, message: &str) -> MethodBody {
    let exception = ctx.type_ref(names::CORE_MODULE, names::UNSUPPORTED_EXCEPTION);
    let exception_ctor = ctx.member_ref(exception, ".ctor", "(Tala.Core.String)void");
    let mut body = MethodBody::new();
    body.push(Op::LoadString(message.to_string()));
    body.push(Op::NewObj(exception_ctor));
    body.push(Op::Throw);
    body
}
