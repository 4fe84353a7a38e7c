// Build metadata reported by `sliplink version --extended`.
fn main() {
    for (var, key) in [
        ("TARGET", "SLIPLINK_BUILD_TARGET"),
        ("PROFILE", "SLIPLINK_BUILD_PROFILE"),
    ] {
        if let Ok(value) = std::env::var(var) {
            println!("cargo:rustc-env={key}={value}");
        }
        println!("cargo:rerun-if-env-changed={var}");
    }
}
