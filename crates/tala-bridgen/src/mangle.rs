//! JNI name mangling and signature parsing
//!
//! The three generators agree on entry-point symbols purely through the
//! conventions implemented here: the emitted module orders trampolines the
//! same way the IR names them, and the Java stubs declare the natives the
//! symbols resolve to.

/// A parsed JNI type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JniType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Reference type, slash-delimited class name without `L`/`;`
    Object(String),
    Array(Box<JniType>),
}

impl JniType {
    /// LLVM IR type used at the native ABI boundary.
    ///
    /// boolean/byte are 1-byte integers, char/short 2-byte, int 4-byte,
    /// long 8-byte; references and arrays are opaque pointers.
    pub fn llvm(&self) -> &'static str {
        match self {
            JniType::Void => "void",
            JniType::Boolean | JniType::Byte => "i8",
            JniType::Char | JniType::Short => "i16",
            JniType::Int => "i32",
            JniType::Long => "i64",
            JniType::Float => "float",
            JniType::Double => "double",
            JniType::Object(_) | JniType::Array(_) => "ptr",
        }
    }

    /// Java source type for stub declarations.
    pub fn java(&self) -> String {
        match self {
            JniType::Void => "void".to_string(),
            JniType::Boolean => "boolean".to_string(),
            JniType::Byte => "byte".to_string(),
            JniType::Char => "char".to_string(),
            JniType::Short => "short".to_string(),
            JniType::Int => "int".to_string(),
            JniType::Long => "long".to_string(),
            JniType::Float => "float".to_string(),
            JniType::Double => "double".to_string(),
            JniType::Object(name) => name.replace('/', ".").replace('$', "."),
            JniType::Array(element) => format!("{}[]", element.java()),
        }
    }

    /// True for `void`
    pub fn is_void(&self) -> bool {
        matches!(self, JniType::Void)
    }
}

/// Parse a JNI method signature `(params)return` into parameter and return
/// types. Malformed signatures yield `None`.
pub fn parse_signature(signature: &str) -> Option<(Vec<JniType>, JniType)> {
    let bytes = signature.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }

    let mut pos = 1usize;
    let mut params = Vec::new();
    while pos < bytes.len() && bytes[pos] != b')' {
        let (ty, next) = parse_type(signature, pos)?;
        params.push(ty);
        pos = next;
    }
    if pos >= bytes.len() {
        return None;
    }
    // Skip ')'
    pos += 1;
    let (ret, next) = parse_type(signature, pos)?;
    if next != bytes.len() {
        return None;
    }
    Some((params, ret))
}

fn parse_type(signature: &str, pos: usize) -> Option<(JniType, usize)> {
    let bytes = signature.as_bytes();
    match *bytes.get(pos)? {
        b'V' => Some((JniType::Void, pos + 1)),
        b'Z' => Some((JniType::Boolean, pos + 1)),
        b'B' => Some((JniType::Byte, pos + 1)),
        b'C' => Some((JniType::Char, pos + 1)),
        b'S' => Some((JniType::Short, pos + 1)),
        b'I' => Some((JniType::Int, pos + 1)),
        b'J' => Some((JniType::Long, pos + 1)),
        b'F' => Some((JniType::Float, pos + 1)),
        b'D' => Some((JniType::Double, pos + 1)),
        b'L' => {
            let end = signature[pos..].find(';')? + pos;
            let name = signature[pos + 1..end].to_string();
            Some((JniType::Object(name), end + 1))
        }
        b'[' => {
            let (element, next) = parse_type(signature, pos + 1)?;
            Some((JniType::Array(Box::new(element)), next))
        }
        _ => None,
    }
}

/// Mangle a JNI class or member name for use in a native symbol.
///
/// `/` and `.` become `_`; the metacharacters `_`, `;`, `[` and `$` get
/// escape sequences so distinct names never collide.
pub fn mangle(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '/' | '.' => out.push('_'),
            '_' => out.push_str("_1"),
            ';' => out.push_str("_2"),
            '[' => out.push_str("_3"),
            '$' => out.push_str("_00024"),
            other => out.push(other),
        }
    }
    out
}

/// Mangle the parameter portion of a JNI signature (everything between the
/// parentheses).
fn mangle_signature_params(signature: &str) -> String {
    let inner = signature
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .unwrap_or("");
    mangle(inner)
}

/// Native entry-point symbol for an ordinary marshal method.
///
/// `Java_<mangled-class>_n_<mangled-member>__<mangled-params>`; the `n_`
/// callback prefix sits outside the mangled member name.
pub fn native_method_symbol(class_jni: &str, member: &str, signature: &str) -> String {
    format!(
        "Java_{}_n_{}__{}",
        mangle(class_jni),
        mangle(member),
        mangle_signature_params(signature)
    )
}

/// Native entry-point symbol for an activation trampoline.
///
/// `Java_<mangled-class>_nc_activate_<index>`, with the mangled parameter
/// suffix only for non-default signatures.
pub fn activation_symbol(class_jni: &str, index: usize, signature: &str) -> String {
    let mut symbol = format!("Java_{}_nc_activate_{}", mangle(class_jni), index);
    if signature != "()V" {
        symbol.push_str("__");
        symbol.push_str(&mangle_signature_params(signature));
    }
    symbol
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn native_name_mangling_round_trip() {
        let symbol = native_method_symbol("mono/android/app/Application", "onCreate", "()V");
        assert_eq!(symbol, "Java_mono_android_app_Application_n_onCreate__");
        // Deterministic
        assert_eq!(
            symbol,
            native_method_symbol("mono/android/app/Application", "onCreate", "()V")
        );
    }

    #[test]
    fn mangling_is_collision_free_over_metacharacters() {
        // Names that collapse to the same symbol under naive '/'->'_'
        // replacement must stay distinct
        let names = ["a/b", "a_b", "a;b", "a[b", "a$b", "a_1b", "a__b", "a//b"];
        let mangled: HashSet<String> = names.iter().map(|n| mangle(n)).collect();
        assert_eq!(mangled.len(), names.len());

        // Dotted and slashed spellings of one class name converge on purpose
        assert_eq!(mangle("mono.android.app.Application"), mangle("mono/android/app/Application"));
    }

    #[test]
    fn method_symbol_includes_signature_params() {
        let symbol = native_method_symbol(
            "com/example/MainActivity",
            "onCreate",
            "(Landroid/os/Bundle;)V",
        );
        assert_eq!(
            symbol,
            "Java_com_example_MainActivity_n_onCreate__Landroid_os_Bundle_2"
        );
    }

    #[test]
    fn activation_symbol_omits_default_signature() {
        assert_eq!(
            activation_symbol("com/example/Widget", 0, "()V"),
            "Java_com_example_Widget_nc_activate_0"
        );
        assert_eq!(
            activation_symbol("com/example/Widget", 1, "(Landroid/content/Context;)V"),
            "Java_com_example_Widget_nc_activate_1__Landroid_content_Context_2"
        );
    }

    #[test]
    fn dollar_mangling() {
        assert_eq!(
            mangle("android/view/View$OnClickListener"),
            "android_view_View_00024OnClickListener"
        );
    }

    #[test]
    fn parse_simple_signature() {
        let (params, ret) = parse_signature("(Landroid/os/Bundle;IZ)V").unwrap();
        assert_eq!(
            params,
            vec![
                JniType::Object("android/os/Bundle".to_string()),
                JniType::Int,
                JniType::Boolean,
            ]
        );
        assert_eq!(ret, JniType::Void);
    }

    #[test]
    fn parse_array_signature() {
        let (params, ret) = parse_signature("([I[Ljava/lang/String;)J").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], JniType::Array(Box::new(JniType::Int)));
        assert_eq!(
            params[1],
            JniType::Array(Box::new(JniType::Object("java/lang/String".to_string())))
        );
        assert_eq!(ret, JniType::Long);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_signature("").is_none());
        assert!(parse_signature("()").is_none());
        assert!(parse_signature("(I").is_none());
        assert!(parse_signature("(Lunterminated)V").is_none());
        assert!(parse_signature("(I)VX").is_none());
    }

    #[test]
    fn llvm_type_table() {
        let (params, ret) = parse_signature("(ZBCSIJFDLjava/lang/Object;[I)D").unwrap();
        let llvm: Vec<&str> = params.iter().map(|p| p.llvm()).collect();
        assert_eq!(
            llvm,
            vec!["i8", "i8", "i16", "i16", "i32", "i64", "float", "double", "ptr", "ptr"]
        );
        assert_eq!(ret.llvm(), "double");
    }

    #[test]
    fn java_type_table() {
        let (params, _) = parse_signature("(Landroid/view/View$OnClickListener;[[J)V").unwrap();
        assert_eq!(params[0].java(), "android.view.View.OnClickListener");
        assert_eq!(params[1].java(), "long[][]");
    }
}
