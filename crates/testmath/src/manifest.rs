//! JSON manifest describing the exported primitives.
//!
//! Hosts that bind native libraries from a manifest instead of probing `hlp_`
//! symbols read this shape:
//!
//! ```json
//! {
//!     "name": "testmath",
//!     "version": "0.1.0",
//!     "library": "testmath.hdll",
//!     "functions": [
//!         {
//!             "name": "testmath_add",
//!             "haxe_name": "TestMath.add",
//!             "params": [{"name": "a", "type": "i32"}, {"name": "b", "type": "i32"}],
//!             "returns": "i32",
//!             "is_static": true
//!         }
//!     ]
//! }
//! ```
//!
//! The manifest is derived from the same `hlp_` calls a host would make, so it
//! cannot drift from the symbol table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use testkit_core::error::SignatureError;
use testkit_core::signature::Signature;

use crate::{CLASS_NAME, LIBRARY_NAME, PRIMITIVES, Primitive};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("hlp_{name} returned no signature or a null address")]
    Introspection { name: &'static str },
    #[error("hlp_{name}: {source}")]
    Signature {
        name: &'static str,
        #[source]
        source: SignatureError,
    },
    #[error("{name}: {declared} declared parameter(s) but signature {signature:?}")]
    ParamCount {
        name: &'static str,
        declared: usize,
        signature: String,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    pub library: String,
    pub functions: Vec<FunctionDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDef {
    /// C symbol, `<library>_<method>`.
    pub name: String,
    /// `Class.method`.
    pub haxe_name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub returns: String,
    #[serde(default = "default_true")]
    pub is_static: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
}

fn default_true() -> bool {
    true
}

fn describe(prim: &Primitive) -> Result<FunctionDef, ManifestError> {
    let info = prim
        .introspect()
        .ok_or(ManifestError::Introspection { name: prim.name })?;
    let sig = Signature::parse_bytes(info.signature.to_bytes()).map_err(|source| {
        ManifestError::Signature {
            name: prim.name,
            source,
        }
    })?;
    if sig.arity() != prim.params.len() {
        return Err(ManifestError::ParamCount {
            name: prim.name,
            declared: prim.params.len(),
            signature: sig.to_string(),
        });
    }

    let params = prim
        .params
        .iter()
        .zip(&sig.params)
        .map(|(name, code)| Param {
            name: (*name).to_string(),
            param_type: code.manifest_name().to_string(),
        })
        .collect();

    Ok(FunctionDef {
        name: prim.symbol.to_string(),
        haxe_name: format!("{CLASS_NAME}.{}", prim.name),
        params,
        returns: sig.ret.manifest_name().to_string(),
        is_static: true,
    })
}

/// Build the manifest by introspecting every primitive.
pub fn manifest() -> Result<Manifest, ManifestError> {
    let functions = PRIMITIVES
        .iter()
        .map(describe)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Manifest {
        name: LIBRARY_NAME.to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        library: format!("{LIBRARY_NAME}.hdll"),
        functions,
    })
}

/// [`manifest`] rendered as pretty JSON.
pub fn manifest_json() -> Result<String, ManifestError> {
    Ok(serde_json::to_string_pretty(&manifest()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_lists_every_primitive() {
        let m = manifest().unwrap();
        assert_eq!(m.name, "testmath");
        assert_eq!(m.library, "testmath.hdll");
        let names: Vec<_> = m.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["testmath_add", "testmath_multiply", "testmath_sqrt_approx"]);
    }

    #[test]
    fn add_entry_shape() {
        let m = manifest().unwrap();
        let add = &m.functions[0];
        assert_eq!(add.haxe_name, "TestMath.add");
        assert_eq!(add.returns, "i32");
        assert_eq!(
            add.params,
            vec![
                Param { name: "a".into(), param_type: "i32".into() },
                Param { name: "b".into(), param_type: "i32".into() },
            ]
        );
        assert!(add.is_static);
    }

    #[test]
    fn json_uses_host_field_names() {
        let json = manifest_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["functions"][2]["params"][0]["type"], "f64");
        assert_eq!(v["functions"][2]["returns"], "f64");
        assert_eq!(v["functions"][2]["haxe_name"], "TestMath.sqrt_approx");
    }

    #[test]
    fn json_parses_back_with_defaults() {
        let raw = r#"{
            "name": "testmath",
            "library": "testmath.hdll",
            "functions": [{"name": "testmath_add", "haxe_name": "TestMath.add", "returns": "i32"}]
        }"#;
        let m: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(m.version, None);
        assert!(m.functions[0].is_static);
        assert!(m.functions[0].params.is_empty());
    }
}
