//! Well-known module, type and member names shared by the scanner and the
//! three generators. The generators never call each other; agreeing on
//! these names (and on the trampoline index order) is what keeps the
//! emitted module, the IR and the Java sources in lock-step.

/// The interop runtime module; only modules that are, or reference, this
/// module are scanned.
pub const INTEROP_MODULE: &str = "Tala.Android";

/// Core runtime module (activation helpers, base exceptions).
pub const CORE_MODULE: &str = "Tala.Core";

/// Name of the generated bridges module; also its type namespace.
pub const BRIDGES_MODULE: &str = "_Tala.Android.Bridges";

/// Native-registration attribute recognized on peer types and marshal
/// methods.
pub const REGISTER_ATTRIBUTE: &str = "Tala.Interop.RegisterAttribute";

/// Android-component-style attributes whose `Name` property supplies a
/// peer's JNI name.
pub const COMPONENT_ATTRIBUTES: &[&str] = &[
    "Tala.Android.App.ActivityAttribute",
    "Tala.Android.App.ServiceAttribute",
    "Tala.Android.App.ApplicationAttribute",
    "Tala.Android.App.InstrumentationAttribute",
    "Tala.Android.Content.ReceiverAttribute",
    "Tala.Android.Content.ProviderAttribute",
];

/// Named record field that suppresses Java wrapper generation for a peer.
pub const NO_WRAPPER_FIELD: &str = "NoWrapper";

/// Named record field carrying a component's Java name.
pub const NAME_FIELD: &str = "Name";

/// Activation constructor parameter types.
pub const NATIVE_HANDLE: &str = "Tala.Interop.NativeHandle";
pub const OWNERSHIP_TRANSFER: &str = "Tala.Interop.OwnershipTransfer";

/// Base type of every generated proxy.
pub const PEER_PROXY: &str = "Tala.Android.PeerProxy";

/// Runtime entry points referenced from trampoline bodies.
pub const ANDROID_RUNTIME: &str = "Tala.Android.AndroidRuntime";
pub const ANNOUNCE_UNHANDLED: &str = "AnnounceUnhandledException";
pub const ACTIVATE_PEER: &str = "ActivatePeer";

/// Managed-to-native error conversion.
pub const JAVA_THROWABLE: &str = "Tala.Android.JavaThrowable";
pub const FROM_ERROR: &str = "FromError";

/// Core helpers used by `CreatePeer`.
pub const ACTIVATION_HELPER: &str = "Tala.Core.Activation";
pub const GET_UNINITIALIZED: &str = "GetUninitializedInstance";
pub const UNSUPPORTED_EXCEPTION: &str = "Tala.Core.UnsupportedOperationException";
pub const ERROR_TYPE: &str = "Tala.Core.Error";
pub const OBJECT_TYPE: &str = "Tala.Core.Object";
pub const TYPE_TYPE: &str = "Tala.Core.Type";

/// Declarative type-map record types applied to the bridges module.
pub const TYPE_MAP_ATTRIBUTE: &str = "Tala.Android.TypeMapAttribute";
pub const TYPE_MAP_ASSOCIATION_ATTRIBUTE: &str = "Tala.Android.TypeMapAssociationAttribute";

/// Proxy overrides.
pub const GET_FUNCTION_POINTER: &str = "GetFunctionPointer";
pub const CREATE_PEER: &str = "CreatePeer";

/// Universal native root class.
pub const JAVA_OBJECT: &str = "java/lang/Object";

/// Liveness-helper interface implemented by every generated Java class.
pub const PEER_ANCHOR_INTERFACE: &str = "tala/interop/IPeerAnchor";

/// Fixed external symbol resolved by the native loader; the IR trampolines
/// call through it.
pub const GET_FUNCTION_POINTER_SYMBOL: &str = "typemap_get_function_pointer";
