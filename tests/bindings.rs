//! Regenerates the C header from the current `cbindgen.toml` + `src/abi.rs`
//! surface and diffs it against the checked-in copy in `bindings/`, so a
//! drift between the two (e.g. an ABI change that wasn't followed by a
//! `bindings/hocdb.h` refresh) fails CI instead of shipping silently.

#[test]
fn checked_in_header_matches_regenerated_header() {
    let crate_dir = env!("CARGO_MANIFEST_DIR");
    let config = cbindgen::Config::from_file(format!("{crate_dir}/cbindgen.toml"))
        .expect("cbindgen.toml must parse");

    let bindings = cbindgen::Builder::new()
        .with_crate(crate_dir)
        .with_config(config)
        .generate()
        .expect("cbindgen must be able to generate the header from src/abi.rs");

    let mut generated = Vec::new();
    bindings.write(&mut generated);
    let generated = String::from_utf8(generated).expect("generated header must be UTF-8");

    let checked_in = std::fs::read_to_string(format!("{crate_dir}/bindings/hocdb.h"))
        .expect("bindings/hocdb.h must exist");

    assert_eq!(
        generated, checked_in,
        "bindings/hocdb.h is stale — regenerate it from cbindgen.toml/src/abi.rs and commit the result"
    );
}
