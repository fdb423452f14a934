use std::path::Path;
use std::process::Command;

use vcomp_engine::{EngineConfig, TemplateRegistry};
use vcomp_media::{check_ffmpeg, check_ffprobe};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = EngineConfig::from_env()?;

    println!(
        "vcomp-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    ensure_tool("ffmpeg", check_ffmpeg()?.as_path())?;
    ensure_tool("ffprobe", check_ffprobe()?.as_path())?;

    let templates = TemplateRegistry::load(config.templates_file.as_deref())?;
    println!("vcomp-selfcheck: {} templates", templates.len());

    println!("vcomp-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::NamedTempFile::new_in(path)?;
    drop(probe);
    Ok(())
}

fn ensure_tool(name: &str, path: &Path) -> anyhow::Result<()> {
    let output = Command::new(path)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not available: {}", name, e))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} -version failed: {:?}",
            name,
            output.status
        ));
    }
    Ok(())
}
