fn main() {
    // `run()` carries `cfg_attr(mobile, ...)`; declare the cfgs even when the build helper is skipped.
    println!("cargo:rustc-check-cfg=cfg(desktop)");
    println!("cargo:rustc-check-cfg=cfg(mobile)");

    // `tauri_build::build()` reads env vars exported by the `tauri` crate and `tauri.conf.json`.
    // Only the `app` feature compiles tauri, so the core library builds without it.
    if std::env::var_os("CARGO_FEATURE_APP").is_some() {
        tauri_build::build()
    }
}
