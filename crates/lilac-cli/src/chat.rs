use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use lilac_contracts::chat::{parse_chat_line, ChatIntent, CHAT_HELP_COMMANDS};
use lilac_contracts::events::SessionLog;
use lilac_contracts::images::{download_file_name, mime_for_extension};
use lilac_contracts::{ChatSession, ImageRef, SessionError, Turn};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::client::RelayClient;

pub enum Flow {
    Continue(Vec<String>),
    Quit,
}

/// Drives one chat session: parses lines, talks to the relay, saves images.
pub struct ChatDriver {
    session: ChatSession,
    client: RelayClient,
    log: SessionLog,
    out_dir: PathBuf,
}

impl ChatDriver {
    pub fn new(session: ChatSession, client: RelayClient, log: SessionLog, out_dir: PathBuf) -> Self {
        Self {
            session,
            client,
            log,
            out_dir,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let lines = match parse_chat_line(line) {
            ChatIntent::Noop if self.session.pending_upload().is_some() => self.send("").await?,
            ChatIntent::Noop => Vec::new(),
            ChatIntent::Quit => return Ok(Flow::Quit),
            ChatIntent::Help => CHAT_HELP_COMMANDS
                .iter()
                .map(|(usage, about)| format!("  {usage:<34} {about}"))
                .collect(),
            ChatIntent::Send { prompt } => self.send(&prompt).await?,
            ChatIntent::Attach { paths } => {
                let mut lines = Vec::new();
                for path in paths {
                    lines.push(self.attach(Path::new(&path)).await);
                }
                lines
            }
            ChatIntent::DiscardUpload => {
                self.session.discard_upload();
                vec!["Upload preview discarded; the image stays in context.".to_string()]
            }
            ChatIntent::ClearContext => {
                self.session.clear_context();
                self.emit("context_cleared", Map::new()).await;
                vec!["Image context cleared.".to_string()]
            }
            ChatIntent::ShowContext => self.describe_context(),
            ChatIntent::SetQuality(quality) => {
                self.session.set_quality(quality);
                vec![format!("Quality set to {quality}")]
            }
            ChatIntent::SetProvider(provider) => {
                self.session.set_provider(provider);
                vec![format!("Provider set to {}", provider.label())]
            }
            ChatIntent::NewChat => {
                self.session.reset();
                self.emit("new_chat", Map::new()).await;
                vec!["Started a new chat.".to_string()]
            }
            ChatIntent::Invalid { command, reason } => vec![format!("/{command}: {reason}")],
        };
        Ok(Flow::Continue(lines))
    }

    /// Sends the prompt with a snapshot of the context; the reply is rendered
    /// and any image saved under the output directory.
    pub async fn send(&mut self, prompt: &str) -> Result<Vec<String>> {
        let request = match self.session.begin_send(prompt) {
            Ok(request) => request,
            Err(SessionError::Compose(err)) => return Ok(vec![err.to_string()]),
            Err(err) => return Ok(vec![format!("Cannot send: {err}")]),
        };
        let sent = request.clone();
        self.record(move |log| log.request_sent(&sent)).await;

        let result = self.client.send(&request).await;
        let received = result.clone();
        self.record(move |log| log.result_received(&received)).await;

        let turn = self.session.complete(result)?.clone();
        let mut lines = Vec::new();
        match turn {
            Turn::Assistant { text, image } => {
                lines.push(format!("AI: {text}"));
                if let Some(image) = image {
                    match self.save_image(&image).await {
                        Ok(path) => lines.push(format!("Saved image to {}", path.display())),
                        Err(err) => {
                            tracing::error!(error = %err, "failed to save generated image");
                            lines.push(format!("Could not save image: {err:#}"));
                        }
                    }
                }
                lines.push(format!("Context: {}", self.context_summary()));
            }
            Turn::Error { message } => lines.push(message),
            Turn::User { .. } => {}
        }
        Ok(lines)
    }

    async fn attach(&mut self, path: &Path) -> String {
        match read_image_file(path).await {
            Ok(image) => {
                self.session.attach_upload(image);
                format!(
                    "Attached {} (context: {})",
                    path.display(),
                    self.context_summary()
                )
            }
            Err(err) => format!("Could not attach {}: {err:#}", path.display()),
        }
    }

    fn describe_context(&self) -> Vec<String> {
        let context = self.session.context();
        if context.is_empty() {
            return vec!["Context is empty.".to_string()];
        }
        let mut lines = vec![format!(
            "{} (max {})",
            context.counter_label(),
            context.capacity()
        )];
        for (index, image) in context.iter().enumerate() {
            lines.push(format!(
                "  {}. {} ({} bytes)",
                index + 1,
                image.mime_type(),
                image.len()
            ));
        }
        lines
    }

    fn context_summary(&self) -> String {
        let label = self.session.context().counter_label();
        if label.is_empty() {
            "empty".to_string()
        } else {
            label
        }
    }

    async fn save_image(&self, image: &ImageRef) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;
        let path = unique_path(&self.out_dir, &download_file_name(Local::now(), image)).await?;
        tokio::fs::write(&path, image.bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.emit(
            "image_saved",
            to_payload(json!({ "path": path.to_string_lossy(), "bytes": image.len() })),
        )
        .await;
        Ok(path)
    }

    async fn emit(&self, event_type: &'static str, payload: Map<String, Value>) {
        self.record(move |log| log.emit(event_type, payload)).await;
    }

    /// Runs a session log write on the blocking pool; failures are only logged.
    async fn record<F>(&self, write: F)
    where
        F: FnOnce(&SessionLog) -> Result<Value> + Send + 'static,
    {
        let log = self.log.clone();
        match tokio::task::spawn_blocking(move || write(&log)).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "failed to write session event"),
            Err(err) => tracing::warn!(error = %err, "session event write aborted"),
        }
    }
}

pub async fn run_repl(mut driver: ChatDriver) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Lilac chat started. Type /help for commands.\n")
        .await?;
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let flow = driver.handle_line(&line).await.unwrap_or_else(|err| {
            tracing::error!(error = %err, "chat turn failed");
            Flow::Continue(vec![format!("Error: {err:#}")])
        });
        match flow {
            Flow::Quit => break,
            Flow::Continue(output) => {
                for text in output {
                    stdout.write_all(text.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            }
        }
    }
    Ok(())
}

/// Reads an image file; the MIME type comes from the extension.
pub async fn read_image_file(path: &Path) -> Result<ImageRef> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let mime_type = mime_for_extension(ext)
        .with_context(|| format!("unsupported image type '{ext}'"))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.is_empty() {
        anyhow::bail!("file is empty");
    }
    Ok(ImageRef::new(mime_type, bytes))
}

async fn unique_path(dir: &Path, file_name: &str) -> Result<PathBuf> {
    let candidate = dir.join(file_name);
    if !tokio::fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, "png"));
    let mut index = 1;
    loop {
        let candidate = dir.join(format!("{stem}-{index}.{ext}"));
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        index += 1;
    }
}

fn to_payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
