extern crate cbindgen;

use std::env;

fn main() {
    println!("cargo:rerun-if-changed=src/ffi.rs");

    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    let result = cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_language(cbindgen::Language::C)
        .with_include_guard("GANTRY_LOGGER_H")
        .generate();
    match result {
        Ok(bindings) => {
            bindings.write_to_file("libgantry_logger.h");
        }
        // A syntax error is reported properly by rustc, no need to fail here.
        Err(cbindgen::Error::ParseSyntaxError { .. }) => {}
        Err(e) => panic!("{:?}", e),
    }
}
