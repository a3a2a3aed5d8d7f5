//! Native trampoline text generator
//!
//! Emits one LLVM IR unit per wrapper-generating peer plus a shared init
//! unit. Each JNI entry point loads its cached function pointer; a cold
//! slot is populated through the process-wide
//! `typemap_get_function_pointer` callback, keyed by the peer's UTF-8
//! class name and the trampoline index. The index space must match the
//! module emitter: ordinary methods first, then activation entries.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{BridgenError, BridgenResult};
use crate::mangle::{activation_symbol, native_method_symbol, parse_signature, JniType};
use crate::names;
use crate::peer::{MarshalMethodRecord, PeerCatalog, PeerDescriptor};

const TARGET_DATALAYOUT: &str = "e-m:e-i8:8:32-i16:16:32-i64:64-i128:128-n32:64-S128";
const TARGET_TRIPLE: &str = "aarch64-unknown-linux-android21";

/// Write the per-peer IR files and the shared init unit.
pub fn write_ir_files(catalog: &PeerCatalog, ir_root: &Path) -> BridgenResult<Vec<PathBuf>> {
    std::fs::create_dir_all(ir_root).map_err(|source| BridgenError::CreateDir {
        path: ir_root.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for peer in &catalog.peers {
        if !peer.needs_wrapper() {
            continue;
        }
        let path = ir_root.join(format!("marshal_methods_{}.ll", peer.sanitized_name()));
        std::fs::write(&path, peer_ir(peer)).map_err(|source| BridgenError::WriteArtifact {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }

    let init_path = ir_root.join("marshal_methods_init.ll");
    std::fs::write(&init_path, init_ir()).map_err(|source| BridgenError::WriteArtifact {
        path: init_path.clone(),
        source,
    })?;
    written.push(init_path);

    Ok(written)
}

/// The shared unit: the resolution-callback slot, and an init entry point
/// that aborts when the callback is never supplied.
pub fn init_ir() -> String {
    let error_message = "typemap_get_function_pointer MUST be specified\\0A\\00";
    // Message + newline + terminator
    let error_len = "typemap_get_function_pointer MUST be specified".len() + 2;

    format!(
        r#"; ModuleID = 'marshal_methods_init.ll'
source_filename = "marshal_methods_init.ll"
target datalayout = "{TARGET_DATALAYOUT}"
target triple = "{TARGET_TRIPLE}"

; Process-wide resolution callback, set once at startup
@{symbol} = default local_unnamed_addr global ptr null, align 8

declare i32 @puts(ptr nocapture readonly) local_unnamed_addr
declare void @abort() noreturn

@.str.error = private unnamed_addr constant [{error_len} x i8] c"{error_message}", align 1

define void @tala_marshal_methods_init(ptr %fn) {{
entry:
  %is_null = icmp eq ptr %fn, null
  br i1 %is_null, label %fail, label %store

fail:
  call i32 @puts(ptr @.str.error)
  call void @abort()
  unreachable

store:
  store ptr %fn, ptr @{symbol}, align 8
  ret void
}}
"#,
        symbol = names::GET_FUNCTION_POINTER_SYMBOL,
    )
}

/// The IR unit for one peer.
pub fn peer_ir(peer: &PeerDescriptor) -> String {
    let sanitized = peer.sanitized_name();
    let class_name_bytes = peer.jni_name.as_bytes();
    let class_name_len = class_name_bytes.len();
    let total_slots = peer.trampoline_count();

    let mut out = String::new();
    let _ = write!(
        out,
        r#"; ModuleID = 'marshal_methods_{sanitized}.ll'
source_filename = "marshal_methods_{sanitized}.ll"
target datalayout = "{TARGET_DATALAYOUT}"
target triple = "{TARGET_TRIPLE}"

@{symbol} = external local_unnamed_addr global ptr, align 8

; Cached function pointers
"#,
        symbol = names::GET_FUNCTION_POINTER_SYMBOL,
    );

    for i in 0..total_slots {
        let _ = writeln!(out, "@fn_ptr_{i} = internal unnamed_addr global ptr null, align 8");
    }

    let encoded: String = class_name_bytes.iter().map(|b| format!("\\{b:02X}")).collect();
    let _ = write!(
        out,
        "\n; Class name for \"{jni}\" (length={class_name_len})\n\
         @class_name = internal constant [{class_name_len} x i8] c\"{encoded}\", align 1\n\
         \n; JNI native method stubs\n",
        jni = peer.jni_name,
    );

    for (i, method) in peer.methods.iter().enumerate() {
        write_method_stub(&mut out, peer, method, i, class_name_len);
    }

    let _ = write!(out, "\n; Native constructor activation stubs\n");
    let activation_base = peer.methods.len();
    if peer.constructors.is_empty() {
        write_activation_stub(&mut out, peer, None, 0, activation_base, class_name_len);
    } else {
        for (ctor_index, ctor) in peer.constructors.iter().enumerate() {
            write_activation_stub(
                &mut out,
                peer,
                Some(ctor),
                ctor_index,
                activation_base + ctor_index,
                class_name_len,
            );
        }
    }

    let _ = write!(
        out,
        r#"
attributes #0 = {{ mustprogress nofree norecurse nosync nounwind willreturn memory(argmem: read) uwtable }}

!llvm.module.flags = !{{!0}}
!0 = !{{i32 1, !"wchar_size", i32 4}}
"#
    );

    out
}

fn param_list(params: &[JniType]) -> String {
    let mut out = String::new();
    for (i, param) in params.iter().enumerate() {
        let _ = write!(out, ", {} %p{i}", param.llvm());
    }
    out
}

/// The shared load/resolve/call skeleton. `%fn` is the cached pointer, or
/// the freshly resolved one on the cold path.
fn write_resolve_prologue(out: &mut String, slot: usize, class_name_len: usize) {
    let _ = write!(
        out,
        "entry:\n\
         \x20 %cached_ptr = load ptr, ptr @fn_ptr_{slot}, align 8\n\
         \x20 %is_null = icmp eq ptr %cached_ptr, null\n\
         \x20 br i1 %is_null, label %resolve, label %call\n\
         \n\
         resolve:\n\
         \x20 %get_fn = load ptr, ptr @{symbol}, align 8\n\
         \x20 call void %get_fn(ptr @class_name, i32 {class_name_len}, i32 {slot}, ptr @fn_ptr_{slot})\n\
         \x20 %resolved_ptr = load ptr, ptr @fn_ptr_{slot}, align 8\n\
         \x20 br label %call\n\
         \n\
         call:\n\
         \x20 %fn = phi ptr [ %cached_ptr, %entry ], [ %resolved_ptr, %resolve ]\n",
        symbol = names::GET_FUNCTION_POINTER_SYMBOL,
    );
}

fn write_method_stub(
    out: &mut String,
    peer: &PeerDescriptor,
    method: &MarshalMethodRecord,
    slot: usize,
    class_name_len: usize,
) {
    let symbol = native_method_symbol(&peer.jni_name, &method.jni_name, &method.jni_signature);
    // Call-site arguments carry the same typed list as the parameters
    let params = param_list(&method.params);
    let args = params.clone();
    let ret = method.return_type.llvm();

    let _ = write!(
        out,
        "\n; Method: {}{}\n\
         define default {ret} @{symbol}(ptr %env, ptr %obj{params}) #0 {{\n",
        method.jni_name, method.jni_signature,
    );
    write_resolve_prologue(out, slot, class_name_len);
    if method.return_type.is_void() {
        let _ = write!(
            out,
            "\x20 tail call void %fn(ptr %env, ptr %obj{args})\n\x20 ret void\n}}\n"
        );
    } else {
        let _ = write!(
            out,
            "\x20 %result = tail call {ret} %fn(ptr %env, ptr %obj{args})\n\x20 ret {ret} %result\n}}\n"
        );
    }
}

fn write_activation_stub(
    out: &mut String,
    peer: &PeerDescriptor,
    ctor: Option<&MarshalMethodRecord>,
    ctor_index: usize,
    slot: usize,
    class_name_len: usize,
) {
    let signature = ctor.map(|c| c.jni_signature.as_str()).unwrap_or("()V");
    let symbol = activation_symbol(&peer.jni_name, ctor_index, signature);
    let params = ctor
        .map(|c| c.params.clone())
        .or_else(|| parse_signature(signature).map(|(p, _)| p))
        .unwrap_or_default();
    let param_text = param_list(&params);
    let args = param_text.clone();

    let comment = match ctor {
        Some(c) => format!("constructor activation for {}", c.jni_signature),
        None => "default constructor activation".to_string(),
    };

    let _ = write!(
        out,
        "\n; nc_activate_{ctor_index} - {comment}\n\
         define default void @{symbol}(ptr %env, ptr %obj{param_text}) #0 {{\n"
    );
    write_resolve_prologue(out, slot, class_name_len);
    let _ = write!(
        out,
        "\x20 tail call void %fn(ptr %env, ptr %obj{args})\n\x20 ret void\n}}\n"
    );
}
