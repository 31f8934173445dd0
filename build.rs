use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Emits VERGEN_BUILD_TIMESTAMP and VERGEN_GIT_SHA; falls back to defaults outside a git checkout.
    EmitBuilder::builder()
        .build_timestamp()
        .git_sha(true)
        .emit()?;
    Ok(())
}
