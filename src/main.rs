#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = worksheet_grader::run().await {
        eprintln!("worksheet-grader fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
