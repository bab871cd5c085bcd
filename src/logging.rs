use anyhow::Result;
use tracing_subscriber::fmt;

pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}
