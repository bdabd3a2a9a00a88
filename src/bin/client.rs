//! Reference client: spawns the server as a subprocess over stdio and
//! exercises the resource listing and read calls.

use anyhow::Result;
use rmcp::{
    model::{ReadResourceRequestParam, ResourceContents},
    transport::{ConfigureCommandExt, TokioChildProcess},
    ServiceExt,
};
use tokio::process::Command;

#[tokio::main]
async fn main() -> Result<()> {
    let transport = TokioChildProcess::new(Command::new("cargo").configure(|cmd| {
        cmd.arg("run")
            .arg("--quiet")
            .arg("--bin")
            .arg("tos-mcp-server")
            .env("TOS_ACCESS_KEY", "your-access-key")
            .env("TOS_SECRET_KEY", "your-secret-key")
            .env("TOS_ENDPOINT", "https://your-bucket.tos-cn-beijing.volces.com")
            .env("TOS_REGION", "cn-beijing");
    }))?;

    let service = ().serve(transport).await?;

    let resources = service.list_resources(Default::default()).await?;
    println!("Found {} resources", resources.resources.len());

    if let Some(first) = resources.resources.first() {
        let content = service
            .read_resource(ReadResourceRequestParam {
                uri: first.raw.uri.clone(),
            })
            .await?;

        if let Some(ResourceContents::TextResourceContents { text, .. }) = content.contents.first()
        {
            let preview: String = text.chars().take(50).collect();
            println!("First resource content: {}...", preview);
        }
    }

    service.cancel().await?;

    Ok(())
}
