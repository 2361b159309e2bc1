use anyhow::Result;
use clap::Parser;
use indie_canvas::cli::shell::{ConfigField, HELP};
use indie_canvas::cli::{Cli, Commands, ShellCommand};
use indie_canvas::{
    utils, AppError, CanvasKind, ConnectionConfig, IngestOutcome, Page, Session, Settings,
};
use std::path::{Path, PathBuf};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::new()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let mut session = Session::new(settings);

    match cli.command {
        Commands::Shell => handle_shell(&mut session).await,
        Commands::Chat { prompt, files } => handle_chat(&mut session, prompt, files).await,
        Commands::Generate {
            kind,
            files,
            out,
            stdout,
        } => handle_generate(&mut session, kind, files, out, stdout).await,
        Commands::TestConnection => handle_test_connection(&session).await,
    }
}

/// Turn a refusal into the hint the user needs to fix it.
fn explain(error: &AppError) -> String {
    match error {
        AppError::NoDocuments => {
            "Please upload some files first (/upload <path>).".to_string()
        }
        AppError::NotConfigured(detail) => format!(
            "Please configure Azure OpenAI settings first ({}). See /help for /config.",
            detail
        ),
        other => other.to_string(),
    }
}

async fn upload_paths(session: &mut Session, paths: &[PathBuf]) {
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                utils::print_error(&format!("Could not read {}: {}", path.display(), e));
                continue;
            }
        };

        match session.ingest_file(&name, &bytes) {
            IngestOutcome::Added => utils::print_success(&format!("Processed {}", name)),
            IngestOutcome::SkippedTombstoned => utils::print_warning(&format!(
                "Skipped {}: it was removed earlier in this session",
                name
            )),
            IngestOutcome::Rejected(e) => utils::print_error(&e.to_string()),
        }
    }

    let count = session.documents().len();
    if count > 0 {
        utils::print_info(&format!("{} files processed and ready for AI chat", count));
    }
}

async fn handle_chat(session: &mut Session, prompt: String, files: Vec<PathBuf>) -> Result<()> {
    upload_paths(session, &files).await;
    utils::print_info("Sending request...");

    match session.ask(&prompt).await {
        Ok(answer) => {
            println!("\n{}", answer);
            Ok(())
        }
        Err(e) => {
            utils::print_error(&explain(&e));
            Err(e.into())
        }
    }
}

async fn handle_generate(
    session: &mut Session,
    kind: CanvasKind,
    files: Vec<PathBuf>,
    out: PathBuf,
    stdout: bool,
) -> Result<()> {
    upload_paths(session, &files).await;
    utils::print_info(&format!("Generating your {}... do not go away!", kind.title()));

    let artifact = match session.generate(kind).await {
        Ok(artifact) => artifact,
        Err(e) => {
            utils::print_error(&explain(&e));
            return Err(e.into());
        }
    };

    if stdout {
        println!("{}", artifact.html);
    } else {
        let path = artifact.save_to(&out).await?;
        utils::print_success(&format!("Saved {} ({})", path.display(), artifact.mime()));
    }
    Ok(())
}

async fn handle_test_connection(session: &Session) -> Result<()> {
    utils::print_info("Testing connection...");
    match session.test_connection().await {
        Ok(()) => {
            utils::print_success("Connection successful! Azure OpenAI is working correctly.");
            Ok(())
        }
        Err(e) => {
            utils::print_error(&format!("Connection failed: {}", e));
            Err(e.into())
        }
    }
}

fn print_status(config: &ConnectionConfig) {
    utils::print_field("Endpoint", &config.endpoint);
    utils::print_field("API key", &config.masked_key());
    utils::print_field("Deployment", &config.deployment);
    utils::print_field("API version", &config.api_version);
    if config.is_complete() {
        utils::print_success("Azure OpenAI configured");
    } else {
        utils::print_warning("Please configure all Azure OpenAI settings");
    }
}

fn print_documents(session: &Session) {
    if session.documents().is_empty() {
        utils::print_info("Upload files to get started (/upload <path>)");
        return;
    }
    utils::print_header(&format!("Processed Files ({})", session.documents().len()));
    for doc in session.documents() {
        println!(
            "  {}  ({} bytes uploaded, {} characters)",
            doc.name(),
            doc.size_bytes(),
            doc.char_count()
        );
    }
}

async fn handle_shell(session: &mut Session) -> Result<()> {
    utils::print_header("IndieApp Shell");
    utils::print_info("Type /help for commands, or ask a question about your files.\n");

    // Edits are staged like an unsaved settings form until /save.
    let mut staged = session.connection().clone();

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt(&format!("[{}] > ", session.current_page()))?;
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let command = match ShellCommand::parse(&input) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                utils::print_error(&e);
                continue;
            }
        };

        match command {
            ShellCommand::Upload(paths) => {
                session.set_page(Page::FileUpload);
                upload_paths(session, &paths).await;
            }
            ShellCommand::ListDocuments => print_documents(session),
            ShellCommand::Show(name) => match session.document(&name) {
                Some(doc) => {
                    utils::print_header(doc.name());
                    println!("{}", doc.text());
                    utils::print_info(&format!("File size: {} characters", doc.char_count()));
                }
                None => utils::print_error(&format!("No processed file named {}", name)),
            },
            ShellCommand::Remove(name) => {
                if session.remove_document(&name) {
                    utils::print_success(&format!("Removed {}", name));
                } else {
                    utils::print_warning(&format!("{} was not in context", name));
                }
            }
            ShellCommand::ClearAll => {
                let removed = session.clear_all();
                utils::print_success(&format!("Cleared {} files", removed));
            }
            ShellCommand::SetConfig(field, value) => {
                session.set_page(Page::Settings);
                match field {
                    ConfigField::Endpoint => staged.endpoint = value,
                    ConfigField::ApiKey => staged.api_key = value,
                    ConfigField::Deployment => staged.deployment = value,
                    ConfigField::ApiVersion => staged.api_version = value,
                }
                utils::print_info("Staged. Use /save to apply or /test to try it.");
            }
            ShellCommand::SaveConfig => {
                session.save_connection(staged.clone());
                utils::print_success("Settings saved successfully!");
            }
            ShellCommand::Status => print_status(&staged),
            ShellCommand::TestConnection => {
                utils::print_info("Testing connection...");
                let timeout = std::time::Duration::from_secs(session.settings().http.timeout_secs);
                match indie_canvas::api::test_connection(&staged, timeout).await {
                    Ok(()) => utils::print_success(
                        "Connection successful! Azure OpenAI is working correctly.",
                    ),
                    Err(e) => utils::print_error(&format!("Connection failed: {}", e)),
                }
            }
            ShellCommand::Generate { kind, out } => {
                session.set_page(Page::Generation);
                utils::print_info(&format!("Generating your {}... do not go away!", kind.title()));
                match session.generate(kind).await {
                    Ok(artifact) => {
                        let dir = out.as_deref().unwrap_or_else(|| Path::new("."));
                        match artifact.save_to(dir).await {
                            Ok(path) => utils::print_success(&format!(
                                "Your {} is ready: {}",
                                kind.title(),
                                path.display()
                            )),
                            Err(e) => utils::print_error(&format!("Could not save file: {}", e)),
                        }
                    }
                    Err(e) => utils::print_error(&explain(&e)),
                }
            }
            ShellCommand::Page(page) => {
                session.set_page(page);
                if page == Page::Settings {
                    print_status(&staged);
                } else if page == Page::FileUpload {
                    print_documents(session);
                }
            }
            ShellCommand::History => {
                for message in session.transcript() {
                    utils::print_prompt(&format!("{}: ", message.role))?;
                    println!("{}\n", message.content);
                }
            }
            ShellCommand::Help => println!("{}", HELP),
            ShellCommand::Quit => break,
            ShellCommand::Ask(question) => {
                session.set_page(Page::Chat);
                match session.ask(&question).await {
                    Ok(answer) => {
                        utils::print_prompt("assistant: ")?;
                        println!("{}\n", answer);
                    }
                    Err(e) => utils::print_error(&explain(&e)),
                }
            }
        }
    }

    Ok(())
}
