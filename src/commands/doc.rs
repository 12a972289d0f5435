use super::{CommandContext, CommandHandler};
use crate::core::error::LainError;
use crate::transport::{ChatMessage, ChatTransport, FragmentSink, StreamOutcome, drain};
use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const USAGE: &str = "lain doc <source_file>";

const DOC_SYSTEM_PROMPT: &str = "You are a documentation generator. Given code, generate or update \
detailed markdown documentation for the code file. Summarize what the whole code does and then go \
into details on each function, class, and variable.";

pub struct DocCommand;

#[async_trait]
impl CommandHandler for DocCommand {
    async fn execute(&self, ctx: &CommandContext, args: &[String]) -> Result<(), LainError> {
        let Some(source) = args.first().filter(|arg| !arg.trim().is_empty()) else {
            return Err(LainError::MissingArgument { usage: USAGE });
        };

        let mut console = io::stdout();
        let output = generate_documentation(
            ctx.transport.as_ref(),
            Path::new(source),
            &ctx.cancel,
            &mut console,
        )
        .await?;

        println!();
        crate::display::display_success(&format!(
            "Documentation written to {}",
            output.display()
        ));
        Ok(())
    }

    fn usage(&self) -> &'static str {
        USAGE
    }

    fn description(&self) -> &'static str {
        "Generate markdown documentation next to a source file"
    }
}

/// Sibling markdown path for `source`: the extension becomes `.md`, or
/// `<stem>.doc.md` when the source already is a markdown file. The check
/// ignores case so `README.MD` never maps onto itself.
pub fn output_path(source: &Path) -> PathBuf {
    let is_markdown = source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"));
    if is_markdown {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        source.with_file_name(format!("{}.doc.md", stem))
    } else {
        source.with_extension("md")
    }
}

/// Appends each fragment to the documentation file and echoes it.
struct DocWriter<'a, W: Write> {
    file: File,
    console: &'a mut W,
}

impl<W: Write> FragmentSink for DocWriter<'_, W> {
    fn fragment(&mut self, text: &str) -> Result<(), LainError> {
        self.file.write_all(text.as_bytes())?;
        write!(self.console, "{}", text)?;
        self.console.flush()?;
        Ok(())
    }

    fn error(&mut self, err: &LainError) {
        tracing::debug!("Documentation stream error: {}", err);
        let _ = writeln!(self.console, "\nError: {}", err);
    }
}

/// Streams generated documentation for `source` into its sibling markdown
/// file and returns that file's path.
pub async fn generate_documentation<W: Write>(
    transport: &dyn ChatTransport,
    source: &Path,
    cancel: &CancellationToken,
    console: &mut W,
) -> Result<PathBuf, LainError> {
    if !source.is_file() {
        return Err(LainError::FileNotFound(source.to_path_buf()));
    }

    let code = fs::read_to_string(source)?;
    let output = output_path(source);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&output)?;
    tracing::info!(
        "Generating documentation for {} into {}",
        source.display(),
        output.display()
    );

    let messages = [
        ChatMessage::system(DOC_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Generate detailed markdown documentation for the following code:\n\n{}",
            code
        )),
    ];
    let stream = transport.send(&messages).await?;

    let mut writer = DocWriter { file, console };
    let summary = drain(stream, cancel, &mut writer).await?;
    writer.file.flush()?;

    if summary.outcome == StreamOutcome::Cancelled {
        return Err(LainError::Cancelled);
    }
    if summary.fragments == 0 {
        tracing::warn!("No documentation was produced for {}", source.display());
    }

    Ok(output)
}
