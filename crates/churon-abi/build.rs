fn main() {
    let target_os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let target_family = std::env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    let shadow = std::env::var_os("CARGO_FEATURE_ABORT_SHADOW").is_some();

    // rustc writes the cdylib export list itself; a second version script
    // would clash with it. Binding symbols at link time is enough to keep the
    // host's `abort` from preempting the override inside this object.
    if shadow && target_family == "unix" && !matches!(target_os.as_str(), "macos" | "ios") {
        println!("cargo:rustc-cdylib-link-arg=-Wl,-Bsymbolic");
    }
    // Test binaries stand in for the host: the module they load looks up
    // `Rf_error` and `R_registerRoutines` in the executable.
    if target_os == "linux" {
        println!("cargo:rustc-link-arg-tests=-Wl,--export-dynamic");
    }
    println!("cargo:rerun-if-changed=build.rs");
}
