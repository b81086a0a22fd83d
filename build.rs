fn main() {
    // Emits $OUT_DIR/built.rs with package metadata and the git commit hash.
    if let Err(err) = built::write_built_file() {
        panic!("Failed to acquire build-time information: {err}");
    }
}
