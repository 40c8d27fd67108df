//! TOOLKIT: File System Operations

use async_trait::async_trait;
use filepilot_provider::{object_schema, ParameterSchema};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::{parse_args, resolve, ToolError, ToolTrait};

const NO_CHANGE: &str = "OK (no change needed, content already matched)";

/// File reader
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    #[serde(default)]
    path: String,
}

#[async_trait]
impl ToolTrait for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }
    fn description(&self) -> &str {
        "Read the contents of a given relative file path. Use this when you want to see what's inside a file. Do not use this with directory names."
    }
    fn parameters(&self) -> ParameterSchema {
        object_schema(&[(
            "path",
            "The relative path of a file in the working directory.",
            true,
        )])
    }
    async fn execute(&self, args: &str) -> Result<String, ToolError> {
        let args: ReadFileArgs = parse_args(self.name(), args)?;
        if args.path.is_empty() {
            return Err(ToolError::MissingParameter("path"));
        }

        let path = resolve(&self.root, &args.path);
        debug!("◆ READING: {:?}", path);
        let bytes = tokio::fs::read(&path).await.map_err(|source| ToolError::Read {
            path: args.path,
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Recursive directory lister
pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize, Default)]
struct ListFilesArgs {
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl ToolTrait for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }
    fn description(&self) -> &str {
        "List files and directories at a given path. If no path is provided, lists files in the current directory. Returns a JSON array of strings, directories have a trailing slash."
    }
    fn parameters(&self) -> ParameterSchema {
        object_schema(&[(
            "path",
            "Optional relative path to list files from. Defaults to current directory if not provided.",
            false,
        )])
    }
    async fn execute(&self, args: &str) -> Result<String, ToolError> {
        let args: ListFilesArgs = parse_args(self.name(), args)?;
        let shown = args
            .path
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());

        let dir = resolve(&self.root, &shown);
        debug!("◆ LISTING: {:?}", dir);
        let entries = tokio::task::spawn_blocking(move || walk(&dir))
            .await?
            .map_err(|source| ToolError::List {
                path: shown,
                source,
            })?;

        serde_json::to_string(&entries).map_err(ToolError::Encode)
    }
}

/// Every entry below `dir` in lexical traversal order, relative to `dir`,
/// directories suffixed with `/`. `dir` itself is excluded.
fn walk(dir: &Path) -> Result<Vec<String>, walkdir::Error> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let mut name = relative.to_string_lossy().into_owned();
        if entry.file_type().is_dir() {
            name.push('/');
        }
        entries.push(name);
    }
    Ok(entries)
}

/// Search-and-replace editor that can also create files
pub struct EditFileTool {
    root: PathBuf,
}

impl EditFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[derive(Deserialize)]
struct EditFileArgs {
    #[serde(default)]
    path: String,
    #[serde(default)]
    old_str: String,
    /// Missing means delete the matches
    #[serde(default)]
    new_str: String,
}

#[async_trait]
impl ToolTrait for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }
    fn description(&self) -> &str {
        "Make edits to a text file. Replaces ALL occurrences of 'old_str' with 'new_str'. If 'old_str' is empty and the file doesn't exist, it creates it with 'new_str'."
    }
    fn parameters(&self) -> ParameterSchema {
        object_schema(&[
            ("path", "The path to the file", true),
            (
                "old_str",
                "Text to search for. If empty and the file doesn't exist, creates the file with new_str as content. If not empty, must match exactly.",
                false,
            ),
            (
                "new_str",
                "Text to replace old_str with, or the initial content if creating a new file.",
                true,
            ),
        ])
    }
    async fn execute(&self, args: &str) -> Result<String, ToolError> {
        let args: EditFileArgs = parse_args(self.name(), args)?;
        if args.path.is_empty() {
            return Err(ToolError::MissingParameter("path"));
        }

        let path = resolve(&self.root, &args.path);
        debug!("◆ EDITING: {:?}", path);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound && args.old_str.is_empty() => {
                return create_new_file(&path, &args.path, &args.new_str).await;
            }
            Err(source) => {
                return Err(ToolError::Read {
                    path: args.path,
                    source,
                })
            }
        };

        if args.old_str.is_empty() {
            if content == args.new_str {
                return Ok(NO_CHANGE.to_string());
            }
            return Err(ToolError::AlreadyExists(args.path));
        }

        if !content.contains(&args.old_str) {
            if content == args.new_str {
                return Ok(NO_CHANGE.to_string());
            }
            return Err(ToolError::NoMatch {
                old_str: args.old_str,
                path: args.path,
            });
        }

        let updated = content.replace(&args.old_str, &args.new_str);
        tokio::fs::write(&path, updated)
            .await
            .map_err(|source| ToolError::Write {
                path: args.path,
                source,
            })?;
        Ok("OK".to_string())
    }
}

async fn create_new_file(path: &Path, shown: &str, content: &str) -> Result<String, ToolError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| ToolError::CreateDir {
                path: parent.to_string_lossy().into_owned(),
                source,
            })?;
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|source| ToolError::Write {
            path: shown.to_string(),
            source,
        })?;
    Ok(format!("Successfully created file {}", shown))
}
