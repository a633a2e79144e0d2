//! File operation tools: read, write, delete, move, and list.

use crate::registry::Tool;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use steward_core::error::ToolError;
use steward_core::types::{RiskLevel, ToolOutput};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Validate that a path stays inside the workspace.
///
/// For existing paths, canonicalizes both path and workspace to handle
/// symlinks. For non-existent paths (e.g., new files to create), normalizes
/// away `..` components and checks the result stays under the workspace.
fn validate_workspace_path(
    workspace: &Path,
    path_str: &str,
    tool_name: &str,
) -> Result<PathBuf, ToolError> {
    let workspace_canonical = workspace
        .canonicalize()
        .unwrap_or_else(|_| workspace.to_path_buf());

    let resolved = if Path::new(path_str).is_absolute() {
        PathBuf::from(path_str)
    } else {
        workspace_canonical.join(path_str)
    };

    if resolved.exists() {
        let canonical = resolved
            .canonicalize()
            .map_err(|e| ToolError::ExecutionFailed {
                name: tool_name.into(),
                message: format!("Path resolution failed: {}", e),
            })?;

        if !canonical.starts_with(&workspace_canonical) {
            return Err(ToolError::PermissionDenied {
                name: tool_name.into(),
                reason: format!("Path '{}' is outside the workspace", path_str),
            });
        }
        return Ok(canonical);
    }

    let mut normalized = Vec::new();
    for component in resolved.components() {
        match component {
            std::path::Component::ParentDir => {
                if normalized.pop().is_none() {
                    return Err(ToolError::PermissionDenied {
                        name: tool_name.into(),
                        reason: format!("Path '{}' escapes the workspace", path_str),
                    });
                }
            }
            std::path::Component::CurDir => {}
            other => normalized.push(other),
        }
    }
    let normalized_path: PathBuf = normalized.iter().collect();

    if !normalized_path.starts_with(&workspace_canonical) {
        return Err(ToolError::PermissionDenied {
            name: tool_name.into(),
            reason: format!("Path '{}' is outside the workspace", path_str),
        });
    }

    Ok(resolved)
}

fn require_path<'a>(args: &'a serde_json::Value, tool: &str) -> Result<&'a str, ToolError> {
    args["path"]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments {
            name: tool.into(),
            reason: "'path' parameter is required".into(),
        })
}

/// Read a file's contents.
pub struct FileReadTool {
    workspace: PathBuf,
}

impl FileReadTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a file's contents. Returns the text of the file."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Truncate output after this many bytes"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path_str = require_path(&args, "file_read")?;
        let path = validate_workspace_path(&self.workspace, path_str, "file_read")?;

        debug!(path = %path.display(), "Reading file");
        let mut content =
            tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    name: "file_read".into(),
                    message: format!("Failed to read '{}': {}", path_str, e),
                })?;

        if let Some(max_bytes) = args["max_bytes"].as_u64() {
            if content.len() as u64 > max_bytes {
                content.truncate(max_bytes as usize);
                content.push_str("\n... (truncated)");
            }
        }

        Ok(ToolOutput::text(content))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Read
    }
}

/// Write content to a file, optionally backing up the previous version.
pub struct FileWriteTool {
    workspace: PathBuf,
}

impl FileWriteTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Set 'backup' to keep a .bak copy of the previous version."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write"
                },
                "backup": {
                    "type": "boolean",
                    "description": "Copy an existing file to <path>.bak before overwriting"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path_str = require_path(&args, "file_write")?;
        let content = args["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                name: "file_write".into(),
                reason: "'content' parameter is required".into(),
            })?;
        let path = validate_workspace_path(&self.workspace, path_str, "file_write")?;

        if args["backup"].as_bool().unwrap_or(false) && path.exists() {
            let backup_path = path.with_extension(backup_extension(&path));
            tokio::fs::copy(&path, &backup_path)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    name: "file_write".into(),
                    message: format!("Backup failed: {}", e),
                })?;
            debug!(backup = %backup_path.display(), "Backed up existing file");
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    name: "file_write".into(),
                    message: format!("Failed to create parent directories: {}", e),
                })?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: "file_write".into(),
                message: format!("Failed to write '{}': {}", path_str, e),
            })?;

        Ok(ToolOutput::text(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path_str
        )))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Modify
    }
}

/// Extension for backup copies: `.ext` becomes `.ext.bak`, no extension
/// becomes `.bak`.
fn backup_extension(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.bak"),
        None => "bak".to_string(),
    }
}

/// Delete a file.
pub struct FileDeleteTool {
    workspace: PathBuf,
}

impl FileDeleteTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileDeleteTool {
    fn name(&self) -> &str {
        "file_delete"
    }

    fn description(&self) -> &str {
        "Delete a file. Irreversible; directories are not deleted."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path_str = require_path(&args, "file_delete")?;
        let path = validate_workspace_path(&self.workspace, path_str, "file_delete")?;

        if path.is_dir() {
            return Err(ToolError::InvalidArguments {
                name: "file_delete".into(),
                reason: format!("'{}' is a directory", path_str),
            });
        }

        warn!(path = %path.display(), "Deleting file");
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: "file_delete".into(),
                message: format!("Failed to delete '{}': {}", path_str, e),
            })?;

        Ok(ToolOutput::text(format!("Deleted {}", path_str)))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Delete
    }
}

/// Move or rename a file within the workspace.
pub struct FileMoveTool {
    workspace: PathBuf,
}

impl FileMoveTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileMoveTool {
    fn name(&self) -> &str {
        "file_move"
    }

    fn description(&self) -> &str {
        "Move or rename a file. Both source and destination must stay inside the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Source path, relative to the workspace"
                },
                "destination": {
                    "type": "string",
                    "description": "Destination path, relative to the workspace"
                }
            },
            "required": ["path", "destination"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let source_str = require_path(&args, "file_move")?;
        let dest_str = args["destination"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                name: "file_move".into(),
                reason: "'destination' parameter is required".into(),
            })?;

        let source = validate_workspace_path(&self.workspace, source_str, "file_move")?;
        let dest = validate_workspace_path(&self.workspace, dest_str, "file_move")?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed {
                    name: "file_move".into(),
                    message: format!("Failed to create parent directories: {}", e),
                })?;
        }

        tokio::fs::rename(&source, &dest)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: "file_move".into(),
                message: format!("Failed to move '{}' to '{}': {}", source_str, dest_str, e),
            })?;

        Ok(ToolOutput::text(format!(
            "Moved {} to {}",
            source_str, dest_str
        )))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Modify
    }
}

/// List files under a directory.
pub struct FileListTool {
    workspace: PathBuf,
}

impl FileListTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List files under a directory, one relative path per line."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path, relative to the workspace (default: workspace root)"
                },
                "max_depth": {
                    "type": "integer",
                    "description": "Maximum directory depth (default: 3)"
                }
            }
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let path_str = args["path"].as_str().unwrap_or(".");
        let root = validate_workspace_path(&self.workspace, path_str, "file_list")?;
        let max_depth = args["max_depth"].as_u64().unwrap_or(3) as usize;

        if !root.is_dir() {
            return Err(ToolError::InvalidArguments {
                name: "file_list".into(),
                reason: format!("'{}' is not a directory", path_str),
            });
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&root)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                let relative = entry.path().strip_prefix(&root).unwrap_or(entry.path());
                entries.push(relative.display().to_string());
            }
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolOutput::text("(no files)"));
        }
        Ok(ToolOutput::text(entries.join("\n"))
            .with_metadata("count", serde_json::json!(entries.len())))
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Read
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }
}
