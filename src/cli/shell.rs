//! Line commands understood by the interactive shell.

use crate::prompts::CanvasKind;
use crate::session::Page;
use std::path::PathBuf;

/// Which connection field a `/config` line sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Endpoint,
    ApiKey,
    Deployment,
    ApiVersion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Upload(Vec<PathBuf>),
    ListDocuments,
    Show(String),
    Remove(String),
    ClearAll,
    SetConfig(ConfigField, String),
    SaveConfig,
    Status,
    TestConnection,
    Generate { kind: CanvasKind, out: Option<PathBuf> },
    Page(Page),
    History,
    Help,
    Quit,
    Ask(String),
}

pub const HELP: &str = "\
Commands:
  /upload <path>...            Add files (max 10MB each)
  /docs                        List processed files
  /show <name>                 Preview a file's extracted text
  /remove <name>               Remove a file from context
  /clear                       Remove all files
  /config <field> <value>      Stage endpoint | key | deployment | version
  /save                        Save staged connection settings
  /status                      Show configuration status
  /test                        Test the staged connection
  /generate <kind> [--out DIR] canvas | value-prop | plan | pitch
  /page <name>                 upload | chat | generate | settings
  /history                     Show the chat transcript
  /help                        Show this help
  /quit                        Exit
Anything else is sent as a question about your files.";

impl ShellCommand {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if !line.starts_with('/') {
            return Ok(Some(ShellCommand::Ask(line.to_string())));
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        let parsed = match command {
            "/upload" => {
                let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
                if paths.is_empty() {
                    return Err("usage: /upload <path>...".to_string());
                }
                ShellCommand::Upload(paths)
            }
            "/docs" | "/files" => ShellCommand::ListDocuments,
            "/show" => ShellCommand::Show(required(rest, "/show <name>")?),
            "/remove" | "/rm" => ShellCommand::Remove(required(rest, "/remove <name>")?),
            "/clear" => ShellCommand::ClearAll,
            "/config" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .map(|(f, v)| (f, v.trim()))
                    .ok_or_else(|| "usage: /config <endpoint|key|deployment|version> <value>".to_string())?;
                let field = match field {
                    "endpoint" => ConfigField::Endpoint,
                    "key" | "api-key" => ConfigField::ApiKey,
                    "deployment" | "model" => ConfigField::Deployment,
                    "version" | "api-version" => ConfigField::ApiVersion,
                    other => return Err(format!("unknown config field '{}'", other)),
                };
                ShellCommand::SetConfig(field, value.to_string())
            }
            "/save" => ShellCommand::SaveConfig,
            "/status" => ShellCommand::Status,
            "/test" => ShellCommand::TestConnection,
            "/generate" | "/gen" => parse_generate(rest)?,
            "/page" => ShellCommand::Page(required(rest, "/page <name>")?.parse()?),
            "/history" => ShellCommand::History,
            "/help" => ShellCommand::Help,
            "/quit" | "/exit" => ShellCommand::Quit,
            other => return Err(format!("unknown command '{}' (try /help)", other)),
        };
        Ok(Some(parsed))
    }
}

fn required(rest: &str, usage: &str) -> Result<String, String> {
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest.to_string())
    }
}

fn parse_generate(rest: &str) -> Result<ShellCommand, String> {
    let mut kind = CanvasKind::BusinessCanvas;
    let mut out = None;
    let mut args = rest.split_whitespace();
    while let Some(arg) = args.next() {
        if arg == "--out" {
            let dir = args.next().ok_or("usage: /generate <kind> --out <dir>")?;
            out = Some(PathBuf::from(dir));
        } else {
            kind = arg.parse()?;
        }
    }
    Ok(ShellCommand::Generate { kind, out })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_a_question() {
        assert_eq!(
            ShellCommand::parse("  what is our churn? ").unwrap(),
            Some(ShellCommand::Ask("what is our churn?".to_string()))
        );
        assert_eq!(ShellCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_upload_takes_many_paths() {
        let cmd = ShellCommand::parse("/upload a.pdf b.docx").unwrap().unwrap();
        assert_eq!(
            cmd,
            ShellCommand::Upload(vec![PathBuf::from("a.pdf"), PathBuf::from("b.docx")])
        );
        assert!(ShellCommand::parse("/upload").is_err());
    }

    #[test]
    fn test_remove_keeps_names_with_spaces() {
        let cmd = ShellCommand::parse("/remove Q3 report.pdf").unwrap().unwrap();
        assert_eq!(cmd, ShellCommand::Remove("Q3 report.pdf".to_string()));
    }

    #[test]
    fn test_config_fields() {
        let cmd = ShellCommand::parse("/config endpoint https://x.openai.azure.com/")
            .unwrap()
            .unwrap();
        assert_eq!(
            cmd,
            ShellCommand::SetConfig(ConfigField::Endpoint, "https://x.openai.azure.com/".to_string())
        );
        assert!(ShellCommand::parse("/config colour blue").is_err());
        assert!(ShellCommand::parse("/config key").is_err());
    }

    #[test]
    fn test_generate_defaults_and_options() {
        assert_eq!(
            ShellCommand::parse("/generate").unwrap().unwrap(),
            ShellCommand::Generate { kind: CanvasKind::BusinessCanvas, out: None }
        );
        assert_eq!(
            ShellCommand::parse("/generate pitch --out build").unwrap().unwrap(),
            ShellCommand::Generate {
                kind: CanvasKind::PitchSlide,
                out: Some(PathBuf::from("build"))
            }
        );
        assert!(ShellCommand::parse("/generate poster").is_err());
    }

    #[test]
    fn test_unknown_command_is_an_error() {
        assert!(ShellCommand::parse("/dance").is_err());
    }
}
