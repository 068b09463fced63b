fn main() {
    // trigger recompilation when a new migration is added
    println!("cargo:rerun-if-changed=migrations");

    vergen::EmitBuilder::builder()
        .build_timestamp()
        .rustc_channel()
        .rustc_commit_hash()
        .rustc_host_triple()
        .rustc_semver()
        .cargo_target_triple()
        .cargo_debug()
        .cargo_opt_level()
        .emit()
        .unwrap();
}
