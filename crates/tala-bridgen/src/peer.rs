//! Peer catalogue data model
//!
//! Descriptors are produced once by the scanner, mutated only by the
//! resolver, and then read by the three generators. Nothing here touches
//! module files.

use crate::mangle::JniType;

/// A method bridged from Java into managed code.
#[derive(Debug, Clone, PartialEq)]
pub struct MarshalMethodRecord {
    /// Java-side method name, `<init>` for constructor registrations
    pub jni_name: String,
    /// JNI method signature, e.g. `(Landroid/os/Bundle;)V`
    pub jni_signature: String,
    /// Managed native-callback symbol, `n_<Name>`
    pub callback_name: String,
    /// Parsed parameter descriptors
    pub params: Vec<JniType>,
    /// Parsed return descriptor
    pub return_type: JniType,
    /// Set when the callback lives on a delegate/invoker type instead of
    /// the peer itself: (managed type name, module name)
    pub callback_type: Option<(String, String)>,
}

/// A managed type bridged to a native Java counterpart.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerDescriptor {
    /// JNI class name, e.g. `com/example/MainActivity`
    pub jni_name: String,
    /// Fully-qualified managed type name
    pub managed_name: String,
    /// Name of the module that defines the type
    pub module: String,
    pub is_interface: bool,
    pub is_abstract: bool,
    /// The peer wraps a pre-existing Java class; no Java wrapper or IR is
    /// generated for it
    pub no_wrapper: bool,
    /// Invoker type (same module) for interface/abstract peers
    pub invoker_type: Option<String>,
    /// Managed base type and its module, absent for roots and interfaces
    pub base_managed: Option<(String, String)>,
    /// JNI name of the base class; filled by the resolver
    pub base_jni_name: Option<String>,
    /// The type declares its own two-argument activation constructor
    pub has_activation_ctor: bool,
    /// Nearest ancestor declaring an activation constructor (managed name,
    /// module); filled by the resolver
    pub activation_ancestor: Option<(String, String)>,
    /// Ordinary marshal methods in source order
    pub methods: Vec<MarshalMethodRecord>,
    /// Constructor marshal methods (`<init>` registrations) in source order
    pub constructors: Vec<MarshalMethodRecord>,
    /// JNI names of implemented native interfaces
    pub native_interfaces: Vec<String>,
}

impl PeerDescriptor {
    /// Proxy type short name: managed separators replaced, `_Proxy` suffix.
    pub fn proxy_type_name(&self) -> String {
        format!("{}_Proxy", self.managed_name.replace(['.', '+'], "_"))
    }

    /// Managed name sanitized for use in file names.
    pub fn sanitized_name(&self) -> String {
        self.managed_name.replace(['.', '/', '+'], "_")
    }

    /// True when the peer gets a Java wrapper, IR trampolines and
    /// native-callable proxy trampolines.
    pub fn needs_wrapper(&self) -> bool {
        !self.no_wrapper && !self.is_interface
    }

    /// True for generated invoker companions; they share the interface's
    /// JNI name and are reachable only through `CreatePeer`, so they get no
    /// type-map entry of their own.
    pub fn is_invoker(&self) -> bool {
        self.no_wrapper && self.managed_name.ends_with("Invoker")
    }

    /// Number of activation trampolines: one per constructor registration,
    /// or exactly one synthetic default.
    pub fn activation_count(&self) -> usize {
        self.constructors.len().max(1)
    }

    /// Total trampoline slots: ordinary methods first, then activations.
    pub fn trampoline_count(&self) -> usize {
        self.methods.len() + self.activation_count()
    }
}

/// Distinct peers registered under one JNI name.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasGroup {
    /// The shared JNI name
    pub jni_name: String,
    /// Catalogue indices of the members, in scan order
    pub members: Vec<usize>,
    /// Name of the synthesized marker type
    pub marker_type_name: String,
}

/// The immutable result of scanning and resolving.
#[derive(Debug, Clone, Default)]
pub struct PeerCatalog {
    /// All discovered peers in scan order
    pub peers: Vec<PeerDescriptor>,
    /// Alias groups; filled by the resolver
    pub alias_groups: Vec<AliasGroup>,
}

impl PeerCatalog {
    pub fn new(peers: Vec<PeerDescriptor>) -> Self {
        Self {
            peers,
            alias_groups: Vec::new(),
        }
    }

    /// Look a peer up by managed type name.
    pub fn find_by_managed(&self, name: &str) -> Option<&PeerDescriptor> {
        self.peers.iter().find(|p| p.managed_name == name)
    }

    /// The alias group a peer belongs to, if any.
    pub fn alias_group_of(&self, peer_index: usize) -> Option<&AliasGroup> {
        self.alias_groups
            .iter()
            .find(|g| g.members.contains(&peer_index))
    }
}
