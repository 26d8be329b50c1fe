use std::path::PathBuf;

pub fn run(data_dir: PathBuf, port: Option<u16>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(optout_server::serve(data_dir, port))
}
