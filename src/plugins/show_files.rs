//! Canned command content served from the per-hostname directory tree.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::{debug, warn};

use super::{CommandKey, CommandPlugin, PluginContext, Response};

/// Serves one literal command per content file under
/// `<directory>/<hostname>/`.
///
/// Each `<command>.txt` file stem becomes a command key at session setup;
/// executing the command replies with the file content normalized to CRLF
/// line endings. Contents are kept in a small TTL cache so repeated show
/// commands in one session do not re-read the disk.
pub struct ShowFileServer {
    host_dir: PathBuf,
    commands: Vec<String>,
    cache: Cache<String, String>,
}

impl ShowFileServer {
    pub async fn new(ctx: &PluginContext) -> Self {
        let host_dir = ctx.directory.join(&ctx.hostname);
        let mut commands = Vec::new();

        match tokio::fs::read_dir(&host_dir).await {
            Ok(mut entries) => {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let path = entry.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some("txt") {
                        continue;
                    }
                    if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                        commands.push(stem.to_string());
                    }
                }
            }
            Err(err) => {
                warn!(
                    "{}: no content directory at {}: {}",
                    ctx.hostname,
                    host_dir.display(),
                    err
                );
            }
        }
        commands.sort();
        debug!(
            "{}: serving {} canned commands from {}",
            ctx.hostname,
            commands.len(),
            host_dir.display()
        );

        let cache = Cache::builder()
            .max_capacity(64)
            .time_to_idle(Duration::from_secs(5 * 60))
            .build();

        Self {
            host_dir,
            commands,
            cache,
        }
    }

    async fn load(&self, command: &str) -> Result<String, std::io::Error> {
        let path = self.host_dir.join(format!("{command}.txt"));
        let content = tokio::fs::read_to_string(&path).await?;
        let normalized = content.lines().collect::<Vec<_>>().join("\r\n");
        Ok(format!("\r\n{normalized}\r\n"))
    }
}

#[async_trait]
impl CommandPlugin for ShowFileServer {
    fn name(&self) -> &'static str {
        "showfs"
    }

    fn commands(&self) -> Vec<CommandKey> {
        self.commands
            .iter()
            .cloned()
            .map(CommandKey::Exact)
            .collect()
    }

    async fn execute_command(&self, line: &str) -> Response {
        let lookup = self
            .cache
            .try_get_with(line.to_string(), self.load(line))
            .await;
        match lookup {
            Ok(content) => Response::output(content),
            Err(err) => Response::output(format!(
                "\r\n% Unable to read content for '{line}': {err}\r\n"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::super::test_context;
    use super::*;

    async fn write_content(dir: &Path, hostname: &str, command: &str, body: &str) {
        let host_dir = dir.join(hostname);
        tokio::fs::create_dir_all(&host_dir).await.expect("mkdir");
        tokio::fs::write(host_dir.join(format!("{command}.txt")), body)
            .await
            .expect("write content");
    }

    #[tokio::test]
    async fn file_stems_become_sorted_command_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_content(dir.path(), "router1", "show version", "IOS 15.2").await;
        write_content(dir.path(), "router1", "show inventory", "Chassis").await;

        let ctx = test_context(dir.path().to_path_buf());
        let plugin = ShowFileServer::new(&ctx).await;
        let keys: Vec<String> = plugin
            .commands()
            .into_iter()
            .map(|key| match key {
                CommandKey::Exact(cmd) => cmd,
                CommandKey::Pattern(_) => panic!("showfs registers literals only"),
            })
            .collect();
        assert_eq!(keys, vec!["show inventory", "show version"]);
    }

    #[tokio::test]
    async fn content_is_normalized_to_crlf() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_content(dir.path(), "router1", "show version", "line one\nline two\n").await;

        let ctx = test_context(dir.path().to_path_buf());
        let plugin = ShowFileServer::new(&ctx).await;
        let response = plugin.execute_command("show version").await;
        assert_eq!(response.output, "\r\nline one\r\nline two\r\n");
        assert!(response.prompt);
    }

    #[tokio::test]
    async fn missing_host_directory_degrades_to_no_commands() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(dir.path().to_path_buf());
        let plugin = ShowFileServer::new(&ctx).await;
        assert!(plugin.commands().is_empty());
    }

    #[tokio::test]
    async fn unreadable_file_is_reported_as_output_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_content(dir.path(), "router1", "show version", "IOS 15.2").await;

        let ctx = test_context(dir.path().to_path_buf());
        let plugin = ShowFileServer::new(&ctx).await;
        tokio::fs::remove_file(
            dir.path().join("router1").join("show version.txt"),
        )
        .await
        .expect("remove");

        let response = plugin.execute_command("show version").await;
        assert!(response.output.contains("Unable to read content"));
        assert!(response.prompt);
    }
}
