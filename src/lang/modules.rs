use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use log::debug;

use crate::lang::ast::FunctionLiteral;
use crate::lang::eval::value::Value;

/// File extension of package sources
const PACKAGE_EXT: &str = "curry";

/// A bundle of named globals and functions, importable under its name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Package {
    pub name: String,
    pub globals: BTreeMap<String, Value>,
    pub functions: BTreeMap<String, Rc<FunctionLiteral>>,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[cfg(test)]
    pub fn with_global(mut self, name: &str, value: Value) -> Self {
        self.globals.insert(name.to_string(), value);
        self
    }

    #[cfg(test)]
    pub fn with_function(mut self, name: &str, func: Rc<FunctionLiteral>) -> Self {
        self.functions.insert(name.to_string(), func);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub name: String,
    pub packages: BTreeMap<String, Package>,
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.insert(package.name.clone(), package);
        self
    }
}

/// Every module known to the engine, keyed by module name
///
/// Built once before evaluation starts
#[derive(Debug, Default)]
pub struct ModuleIndex {
    modules: BTreeMap<String, Module>,
}

impl ModuleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, module: Module) {
        self.modules.insert(module.name.clone(), module);
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Register every `*.curry` file directly under `root` as an (empty) package of module
    /// `module_name`
    ///
    /// Subdirectories are skipped: packages can only be nested one level below their module.
    pub fn index_dir(&mut self, root: &Path, module_name: &str) -> Result<()> {
        let entries = fs::read_dir(root)
            .with_context(|| format!("Failed to read package directory {}", root.display()))?;

        let mut module = self
            .modules
            .remove(module_name)
            .unwrap_or_else(|| Module::new(module_name));

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                debug!("skipping nested package directory {}", path.display());
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) != Some(PACKAGE_EXT) {
                continue;
            }

            let name = match path.file_stem().and_then(|s| s.to_str()) {
                Some(n) => n,
                None => bail!("Package file name is not valid UTF-8: {}", path.display()),
            };

            debug!("indexed package {}/{}", module_name, name);
            module = module.with_package(Package::new(name));
        }

        self.insert(module);
        Ok(())
    }

    /// Find the package an import path names
    ///
    /// `name` refers to package `name` of module `name`, `module/package` to `package` of
    /// `module`. Deeper paths are rejected.
    pub fn resolve(&self, path: &str) -> Result<&Package> {
        let parts: Vec<&str> = path.split('/').collect();
        let (module_name, package_name) = match parts.as_slice() {
            [module] => (*module, *module),
            [module, package] => (*module, *package),
            _ => bail!("Hierarchical package paths are not supported: {}", path),
        };

        let module = self
            .modules
            .get(module_name)
            .ok_or_else(|| anyhow!("Module {} does not exist", module_name))?;

        module.packages.get(package_name).ok_or_else(|| {
            anyhow!(
                "Package {} does not exist in module {}",
                package_name,
                module_name
            )
        })
    }
}

#[cfg(test)]
use tempfile::tempdir;

#[test]
fn test_resolve() {
    let mut index = ModuleIndex::new();
    index.insert(
        Module::new("math").with_package(Package::new("math").with_global("pi", Value::Integer(3))),
    );
    index.insert(
        Module::new("std")
            .with_package(Package::new("io"))
            .with_package(Package::new("strings")),
    );

    let pkg = index.resolve("math").expect("Failed to resolve math");
    assert_eq!(pkg.globals.get("pi"), Some(&Value::Integer(3)));
    assert_eq!(index.resolve("std/io").expect("Failed to resolve").name, "io");

    let tests = vec![
        ("nope", "Module nope does not exist"),
        ("std", "Package std does not exist in module std"),
        ("std/net", "Package net does not exist in module std"),
        (
            "std/io/file",
            "Hierarchical package paths are not supported: std/io/file",
        ),
    ];

    for (path, expected) in tests {
        let err = index.resolve(path).expect_err("Resolve should fail");
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn test_index_dir() {
    let dir = tempdir().expect("Failed to create temp dir");
    let root = dir.path();
    fs::create_dir_all(root.join("nested")).expect("Failed to create dirs");
    fs::write(root.join("math.curry"), "").expect("Failed to write");
    fs::write(root.join("io.curry"), "").expect("Failed to write");
    fs::write(root.join("README.md"), "").expect("Failed to write");
    fs::write(root.join("nested").join("deep.curry"), "").expect("Failed to write");

    let mut index = ModuleIndex::new();
    index.index_dir(root, "std").expect("Failed to index");

    let names: Vec<&String> = index
        .module("std")
        .expect("Missing std")
        .packages
        .keys()
        .collect();
    assert_eq!(names, vec!["io", "math"]);
    assert_eq!(index.resolve("std/math").expect("Missing math").name, "math");
    assert!(index.resolve("std/README").is_err());
    assert!(index.resolve("std/deep").is_err());
    assert!(index.resolve("std/nested").is_err());
}

#[test]
fn test_index_dir_only_nested() {
    let dir = tempdir().expect("Failed to create temp dir");
    fs::create_dir_all(dir.path().join("sub")).expect("Failed to create dirs");
    fs::write(dir.path().join("sub").join("deep.curry"), "").expect("Failed to write");

    let mut index = ModuleIndex::new();
    index.index_dir(dir.path(), "std").expect("Failed to index");

    // Module exists but has nothing importable
    let module = index.module("std").expect("Missing std");
    assert!(module.packages.is_empty());
    assert!(index.module("sub").is_none());
}

#[test]
fn test_index_missing_dir() {
    let mut index = ModuleIndex::new();
    assert!(index
        .index_dir(Path::new("/nonexistent/curry/packages"), "std")
        .is_err());
}
