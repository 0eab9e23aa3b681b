fn main() {
    // Undefined Python symbols are resolved by the interpreter at load time on macOS.
    if cfg!(target_os = "macos") {
        println!("cargo:rustc-link-arg=-undefined");
        println!("cargo:rustc-link-arg=dynamic_lookup");
    }
}
