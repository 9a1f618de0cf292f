//! Built-in tools for the interactive agent.
//!
//! Provides `ask`, `read_url`, `read_file`, `write_file`, `bash`, `git_status`
//! and `git_commit`. Tools that change the host (`bash`, `write_file`,
//! `git_commit`) ask the user through the shared [`Interaction`] first; a
//! refusal is returned to the model as the text [`USER_DENIED`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use parley::interaction::TerminalInteraction;
//! use parley::tools::builtin::all_tools;
//!
//! let tools = all_tools(Arc::new(TerminalInteraction::new()));
//! assert_eq!(tools.len(), 7);
//! ```

use std::path::Path;
use std::sync::Arc;

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ParleyError;
use crate::interaction::Interaction;
use crate::provider::http::{ensure_success, shared_client};
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;
use crate::util::{truncate_chars, truncate_utf8};

/// Result text when the user declines a confirmation.
pub const USER_DENIED: &str = "User denied.";
/// Result text for relative paths given to the file tools.
pub const NOT_ABSOLUTE: &str = "Denied: filepath is not absolute path";
/// Result text when `ask` gets an empty answer.
pub const NO_USER_INPUT: &str = "NO USER INPUT";

const COMMAND_OUTPUT_MAX_BYTES: usize = 32_768;
const READ_FILE_MAX_BYTES: usize = 65_536;
const READ_URL_MAX_BYTES: usize = 65_536;

/// Every builtin tool, in registration order.
pub fn all_tools(interaction: Arc<dyn Interaction>) -> Vec<Arc<dyn Tool>> {
    vec![
        ask_tool(interaction.clone()),
        read_url_tool(),
        read_file_tool(),
        write_file_tool(interaction.clone()),
        bash_tool(interaction.clone()),
        git_status_tool(),
        git_commit_tool(interaction),
    ]
}

fn capped(bytes: &[u8], max_bytes: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() > max_bytes {
        format!("{}\n... (truncated)", truncate_utf8(&text, max_bytes))
    } else {
        text.into_owned()
    }
}

/// Create the `ask` tool: put a question to the user and return the answer.
pub fn ask_tool(interaction: Arc<dyn Interaction>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "ask",
        "Ask a question to the user. Call this for user input",
        AgentToolParameters::object()
            .string("question", "The question to ask the user", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let interaction = interaction.clone();
            async move {
                let question = args.get_str("question")?;
                let answer = interaction.prompt(&format!("\n[ask] {question}\n> ")).await?;
                Ok(match answer {
                    Some(a) if !a.trim().is_empty() => serde_json::Value::String(a),
                    _ => NO_USER_INPUT.into(),
                })
            }
        },
    ))
}

/// Create the `read_url` tool: fetch a page and reduce it to plain text.
pub fn read_url_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "read_url",
        "Read a URL and extract the text content",
        AgentToolParameters::object()
            .string("url", "The URL to read", true)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let url = args.get_str("url")?;
            let resp = ensure_success(shared_client().get(url).send().await?).await?;
            let is_html = resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|ct| ct.contains("html"));
            let body = resp.text().await?;
            let text = if is_html { html_to_text(&body) } else { body };
            Ok(capped(text.as_bytes(), READ_URL_MAX_BYTES).into())
        },
    ))
}

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "iframe", "template", "nav", "footer",
];
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "li", "tr", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "pre",
    "section", "article", "header", "table", "ul", "ol",
];

/// Strip markup from an HTML document, keeping readable text and line breaks.
///
/// Only the `<body>` is read. Entities are decoded by the parser.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .unwrap_or_else(|| document.root_element());

    let mut raw = String::new();
    collect_text(root, &mut raw);
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.extend(text.chars().map(|c| if c == '\n' { ' ' } else { c }));
            }
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                collect_text(child, out);
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Create the `read_file` tool: read an absolute path as UTF-8 text.
pub fn read_file_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "read_file",
        "Read an absolute file path and extract the text content",
        AgentToolParameters::object()
            .string("filepath", "The absolute file path to read", true)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let filepath = args.get_str("filepath")?;
            if !Path::new(filepath).is_absolute() {
                return Ok(NOT_ABSOLUTE.into());
            }
            let content = tokio::fs::read(filepath)
                .await
                .map_err(|e| ParleyError::tool("read_file", format!("{filepath}: {e}")))?;
            Ok(capped(&content, READ_FILE_MAX_BYTES).into())
        },
    ))
}

/// Create the `write_file` tool: write text to an absolute path after the
/// user approves a preview.
pub fn write_file_tool(interaction: Arc<dyn Interaction>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "write_file",
        "Write text content to an absolute file path. User checks it",
        AgentToolParameters::object()
            .string("filepath", "The absolute file path to write", true)
            .string("content", "The content to write to the file", true)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let interaction = interaction.clone();
            async move {
                let filepath = args.get_str("filepath")?;
                let content = args.get_str("content")?;
                if !Path::new(filepath).is_absolute() {
                    return Ok(NOT_ABSOLUTE.into());
                }
                let preview = format!(
                    "Write {filepath}({})\n{}\n",
                    content.chars().count(),
                    truncate_chars(content, 100)
                );
                if !interaction.confirm(&preview).await? {
                    return Ok(USER_DENIED.into());
                }
                if let Some(parent) = Path::new(filepath).parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(|e| {
                        ParleyError::tool("write_file", format!("{}: {e}", parent.display()))
                    })?;
                }
                tokio::fs::write(filepath, content)
                    .await
                    .map_err(|e| ParleyError::tool("write_file", format!("{filepath}: {e}")))?;
                Ok("ok".into())
            }
        },
    ))
}

/// Create the `bash` tool: run a confirmed command through `sh -c`.
///
/// Returns the exit code with stdout and stderr, each capped at 32 KB.
pub fn bash_tool(interaction: Arc<dyn Interaction>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "bash",
        "Propose a bash command to the user. The user reviews the command before it runs and may refuse it.",
        AgentToolParameters::object()
            .string("command", "The command to execute", true)
            .string("cwd", "Current working directory", false)
            .build(),
        move |args, _ctx: ToolExecutionContext| {
            let interaction = interaction.clone();
            async move {
                let command = args.get_str("command")?;
                if !interaction.confirm(&format!("Run: {command}")).await? {
                    return Ok(USER_DENIED.into());
                }
                let mut cmd = tokio::process::Command::new("sh");
                cmd.arg("-c").arg(command);
                if let Some(cwd) = args.get_str_opt("cwd").filter(|c| !c.is_empty()) {
                    cmd.current_dir(cwd);
                }
                let output = cmd
                    .output()
                    .await
                    .map_err(|e| ParleyError::tool("bash", e.to_string()))?;
                Ok(serde_json::json!({
                    "code": output.status.code(),
                    "stdout": capped(&output.stdout, COMMAND_OUTPUT_MAX_BYTES),
                    "stderr": capped(&output.stderr, COMMAND_OUTPUT_MAX_BYTES),
                }))
            }
        },
    ))
}

async fn git(args: &[&str], cwd: Option<&str>) -> Result<std::process::Output, ParleyError> {
    let mut cmd = tokio::process::Command::new("git");
    cmd.args(args);
    if let Some(dir) = cwd.filter(|d| !d.is_empty()) {
        cmd.current_dir(dir);
    }
    cmd.output()
        .await
        .map_err(|e| ParleyError::tool("git", e.to_string()))
}

/// Create the `git_status` tool.
pub fn git_status_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "git_status",
        "Get git status",
        AgentToolParameters::object()
            .string("git_root", "Project root path", false)
            .build(),
        |args, _ctx: ToolExecutionContext| async move {
            let output = git(&["status"], args.get_str_opt("git_root")).await?;
            let stdout = capped(&output.stdout, COMMAND_OUTPUT_MAX_BYTES);
            Ok(serde_json::json!({
                "status": stdout.trim(),
                "stderr": capped(&output.stderr, COMMAND_OUTPUT_MAX_BYTES).trim(),
                "stdout": stdout,
            }))
        },
    ))
}

/// Create the `git_commit` tool: propose a commit message, then stage and
/// commit once the user accepts.
pub fn git_commit_tool(interaction: Arc<dyn Interaction>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "git_commit",
        "Propose git commit message to user and run git commit",
        AgentToolParameters::from_schema(serde_json::json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "The commit message to propose"},
                "files": {
                    "type": "array",
                    "description": "Optional: the files to commit",
                    "items": {"type": "string"},
                },
                "git_root": {"type": "string", "description": "Project root path"},
            },
            "required": ["message"],
        })),
        move |args, _ctx: ToolExecutionContext| {
            let interaction = interaction.clone();
            async move {
                let message = args.get_str("message")?;
                let files: Vec<String> = args
                    .raw()
                    .get("files")
                    .and_then(|f| f.as_array())
                    .map(|f| f.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                let root = args.get_str_opt("git_root");

                let prompt = format!(
                    "Message\n{message}\nAdd files\n{}\n\nCommit?",
                    files.join("\n")
                );
                if !interaction.confirm(&prompt).await? {
                    return Ok(USER_DENIED.into());
                }

                if !files.is_empty() {
                    let mut add = vec!["add", "--"];
                    add.extend(files.iter().map(String::as_str));
                    let output = git(&add, root).await?;
                    if !output.status.success() {
                        return Err(ParleyError::tool(
                            "git_commit",
                            String::from_utf8_lossy(&output.stderr).trim().to_string(),
                        ));
                    }
                }
                let output = git(&["commit", "-m", message], root).await?;
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    return Err(ParleyError::tool(
                        "git_commit",
                        format!("{}{}", stdout.trim(), stderr.trim()),
                    ));
                }
                Ok("User accepted commit message".into())
            }
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::ScriptedInteraction;
    use crate::tools::ToolArguments;

    fn args(value: serde_json::Value) -> ToolArguments {
        ToolArguments::new(value)
    }

    fn ctx() -> ToolExecutionContext {
        ToolExecutionContext::default()
    }

    fn approving() -> Arc<ScriptedInteraction> {
        Arc::new(ScriptedInteraction::default().with_confirmations([true]))
    }

    #[test]
    fn all_tools_have_unique_names() {
        let tools = all_tools(Arc::new(ScriptedInteraction::default()));
        let mut names: Vec<_> = tools.iter().map(|t| t.name().to_string()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 7);
    }

    #[tokio::test]
    async fn ask_returns_marker_for_blank_answer() {
        let tool = ask_tool(Arc::new(ScriptedInteraction::new(["   "])));
        let out = tool
            .execute(&args(serde_json::json!({"question": "Name?"})), &ctx())
            .await
            .unwrap();
        assert_eq!(out, NO_USER_INPUT);
    }

    #[tokio::test]
    async fn ask_returns_the_answer() {
        let io = Arc::new(ScriptedInteraction::new(["blue"]));
        let tool = ask_tool(io.clone());
        let out = tool
            .execute(&args(serde_json::json!({"question": "Color?"})), &ctx())
            .await
            .unwrap();
        assert_eq!(out, "blue");
        assert!(io.transcript()[0].contains("Color?"));
    }

    #[tokio::test]
    async fn read_file_rejects_relative_paths() {
        let out = read_file_tool()
            .execute(&args(serde_json::json!({"filepath": "notes.txt"})), &ctx())
            .await
            .unwrap();
        assert_eq!(out, NOT_ABSOLUTE);
    }

    #[tokio::test]
    async fn read_file_returns_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();
        let out = read_file_tool()
            .execute(
                &args(serde_json::json!({"filepath": path.to_str().unwrap()})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn read_file_missing_is_an_error() {
        let result = read_file_tool()
            .execute(
                &args(serde_json::json!({"filepath": "/definitely/not/here.txt"})),
                &ctx(),
            )
            .await;
        assert!(matches!(result, Err(ParleyError::ToolExecution { .. })));
    }

    #[tokio::test]
    async fn write_file_respects_denial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let tool = write_file_tool(Arc::new(ScriptedInteraction::default()));
        let out = tool
            .execute(
                &args(serde_json::json!({"filepath": path.to_str().unwrap(), "content": "x"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, USER_DENIED);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn write_file_creates_parents_when_approved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.txt");
        let tool = write_file_tool(approving());
        let out = tool
            .execute(
                &args(serde_json::json!({"filepath": path.to_str().unwrap(), "content": "data"})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "data");
    }

    #[tokio::test]
    async fn bash_reports_code_and_streams() {
        let dir = tempfile::tempdir().unwrap();
        let out = bash_tool(approving())
            .execute(
                &args(serde_json::json!({
                    "command": "pwd; echo oops >&2; exit 3",
                    "cwd": dir.path().to_str().unwrap(),
                })),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out["code"], 3);
        assert_eq!(out["stderr"], "oops\n");
        let reported = std::fs::canonicalize(out["stdout"].as_str().unwrap().trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn bash_denied_does_not_run() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("ran");
        let out = bash_tool(Arc::new(ScriptedInteraction::default()))
            .execute(
                &args(serde_json::json!({"command": format!("touch {}", marker.display())})),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, USER_DENIED);
        assert!(!marker.exists());
    }

    #[test]
    fn html_to_text_drops_markup_and_scripts() {
        let html = "<html><head><title>t</title></head><body><script>var x = 1;</script>\
                    <h1>Title</h1><p>Tea &amp; biscuits</p><div>next<br>line</div></body></html>";
        assert_eq!(html_to_text(html), "Title\nTea & biscuits\nnext\nline");
    }

    #[test]
    fn html_to_text_decodes_entities_and_skips_nested_code() {
        let html = r#"<body><div><p>It&#8217;s <b>bold</b> &eacute;t&eacute;</p>
            <div><style>.x { color: red }</style>
            <script>if (a < b) { document.write("<p>leak</p>"); }</script>
            <p>kept</p></div></div></body>"#;
        assert_eq!(html_to_text(html), "It\u{2019}s bold \u{e9}t\u{e9}\nkept");
    }
}
