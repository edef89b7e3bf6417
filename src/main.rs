#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = coursekit_rust::run().await {
        eprintln!("coursekit-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
