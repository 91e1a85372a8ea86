//! Common test utilities shared between integration tests

#![allow(dead_code)]

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// A source module paired with the exact binary it must compile to.
#[derive(Deserialize, Debug)]
pub struct Fixture {
    pub name: String,
    pub source: String,
    pub hex: String,
}

impl Fixture {
    pub fn bytes(&self) -> Vec<u8> {
        hex::decode(&self.hex).unwrap_or_else(|e| panic!("fixture {} has bad hex: {}", self.name, e))
    }
}

pub fn load_fixtures(path: impl AsRef<Path>) -> Vec<Fixture> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    serde_json::from_str(&json).unwrap_or_else(|e| panic!("failed to parse {}: {}", path.display(), e))
}

pub fn fixture(name: &str) -> Fixture {
    load_fixtures("tests/fixtures/modules.json")
        .into_iter()
        .find(|f| f.name == name)
        .unwrap_or_else(|| panic!("no fixture named {}", name))
}

/// Compile `source`, panicking with the error text on failure.
pub fn compile(source: &str) -> Vec<u8> {
    watc::compile(source).unwrap_or_else(|e| panic!("compile failed: {}\n{}", e, source))
}

/// Instantiate a module with an `env.log` import that records every value it
/// is called with.
pub fn instantiate(wasm: &[u8]) -> (wasmi::Store<Vec<i32>>, wasmi::Instance) {
    let engine = wasmi::Engine::default();
    let module = wasmi::Module::new(&engine, wasm).expect("failed to parse wasm module");
    let mut store = wasmi::Store::new(&engine, Vec::new());
    let mut linker = <wasmi::Linker<Vec<i32>>>::new(&engine);
    linker
        .func_wrap("env", "log", |mut caller: wasmi::Caller<'_, Vec<i32>>, value: i32| {
            caller.data_mut().push(value);
        })
        .unwrap();

    let instance = linker
        .instantiate(&mut store, &module)
        .expect("failed to instantiate")
        .start(&mut store)
        .expect("failed to run start function");
    (store, instance)
}
