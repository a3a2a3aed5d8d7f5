//! Java stub generator
//!
//! One Java class per wrapper-generating peer, mirroring the trampolines:
//! constructors call `super(...)` and, only on the exact generated class,
//! the matching private native activation method; public methods delegate
//! to private natives. Every class implements the liveness-helper
//! interface so natively-referenced peers are not collected prematurely.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{BridgenError, BridgenResult};
use crate::mangle::JniType;
use crate::names;
use crate::peer::{MarshalMethodRecord, PeerCatalog, PeerDescriptor};

/// A generated Java source file.
#[derive(Debug, Clone)]
pub struct JavaStub {
    /// Java package, empty for the default package
    pub package: String,
    /// Simple class name
    pub class_name: String,
    /// Full file contents, UTF-8
    pub source: String,
}

impl JavaStub {
    /// `<package dirs>/<Class>.java` under a root.
    pub fn path_under(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        if !self.package.is_empty() {
            for segment in self.package.split('.') {
                path.push(segment);
            }
        }
        path.push(format!("{}.java", self.class_name));
        path
    }
}

/// Write the Java tree for all wrapper-generating peers.
pub fn write_java_files(catalog: &PeerCatalog, java_root: &Path) -> BridgenResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for peer in &catalog.peers {
        if !peer.needs_wrapper() {
            continue;
        }
        let stub = peer_java(peer);
        let path = stub.path_under(java_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BridgenError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&path, &stub.source).map_err(|source| BridgenError::WriteArtifact {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}

/// Generate the stub for one peer.
pub fn peer_java(peer: &PeerDescriptor) -> JavaStub {
    let (package, class_name) = split_jni_name(&peer.jni_name);

    let base_jni = peer.base_jni_name.as_deref().unwrap_or(names::JAVA_OBJECT);
    let extends = base_jni.replace('/', ".").replace('$', ".");

    let mut implements = vec![names::PEER_ANCHOR_INTERFACE.replace('/', ".")];
    for iface in &peer.native_interfaces {
        let java_iface = iface.replace('/', ".").replace('$', ".");
        if !implements.contains(&java_iface) {
            implements.push(java_iface);
        }
    }

    let mut source = String::new();
    if !package.is_empty() {
        let _ = writeln!(source, "package {package};");
        let _ = writeln!(source);
    }
    let _ = writeln!(source, "public class {class_name}");
    let _ = writeln!(source, "    extends {extends}");
    let _ = writeln!(source, "    implements {}", implements.join(", "));
    let _ = writeln!(source, "{{");

    // Constructors: one per discovered activation signature, or a default
    if peer.constructors.is_empty() {
        let _ = writeln!(
            source,
            "    public {class_name} ()\n    {{\n        super ();\n        if (getClass () == {class_name}.class) {{ nc_activate_0 (); }}\n    }}\n"
        );
    } else {
        for (index, ctor) in peer.constructors.iter().enumerate() {
            let params = java_params(&ctor.params);
            let args = java_args(&ctor.params);
            let _ = writeln!(
                source,
                "    public {class_name} ({params})\n    {{\n        super ({args});\n        if (getClass () == {class_name}.class) {{ nc_activate_{index} ({args}); }}\n    }}\n"
            );
        }
    }

    // Public methods delegating to the private natives
    for method in &peer.methods {
        let ret = method.return_type.java();
        let params = java_params(&method.params);
        let args = java_args(&method.params);
        let forward = if method.return_type.is_void() {
            format!("n_{} ({args});", method.jni_name)
        } else {
            format!("return n_{} ({args});", method.jni_name)
        };
        let _ = writeln!(
            source,
            "    public {ret} {name} ({params})\n    {{\n        {forward}\n    }}\n",
            name = method.jni_name,
        );
    }

    // Native declarations
    if peer.constructors.is_empty() {
        let _ = writeln!(source, "    private native void nc_activate_0 ();");
    } else {
        for (index, ctor) in peer.constructors.iter().enumerate() {
            let _ = writeln!(
                source,
                "    private native void nc_activate_{index} ({});",
                java_params(&ctor.params)
            );
        }
    }
    for method in &peer.methods {
        let _ = writeln!(
            source,
            "    private native {} n_{} ({});",
            method.return_type.java(),
            method.jni_name,
            java_params(&method.params)
        );
    }

    // Liveness helper: keep natively-referenced peers alive
    let _ = write!(
        source,
        "\n    private java.util.ArrayList refList;\n\
         \x20   public void talaAddReference (java.lang.Object obj)\n\
         \x20   {{\n\
         \x20       if (refList == null)\n\
         \x20           refList = new java.util.ArrayList ();\n\
         \x20       refList.add (obj);\n\
         \x20   }}\n\
         \n\
         \x20   public void talaClearReferences ()\n\
         \x20   {{\n\
         \x20       if (refList != null)\n\
         \x20           refList.clear ();\n\
         \x20   }}\n\
         }}\n"
    );

    JavaStub {
        package,
        class_name,
        source,
    }
}

/// Split a JNI class name into (package, simple name); `$` in the class
/// segment becomes `_`.
fn split_jni_name(jni_name: &str) -> (String, String) {
    match jni_name.rsplit_once('/') {
        Some((package, class)) => (package.replace('/', "."), class.replace('$', "_")),
        None => (String::new(), jni_name.replace('$', "_")),
    }
}

fn java_params(params: &[JniType]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{} p{i}", p.java()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn java_args(params: &[JniType]) -> String {
    (0..params.len())
        .map(|i| format!("p{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
