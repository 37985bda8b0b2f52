fn main() {
    println!("cargo:rerun-if-changed=tauri.conf.json");

    // Tauri's build steps (Windows resources/manifest, etc.) only apply to the desktop shell.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
