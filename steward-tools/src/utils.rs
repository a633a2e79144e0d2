//! Utility tools — echo and datetime, defined via `define_tool!`.

use steward_core::error::ToolError;
use steward_core::types::ToolOutput;

define_tool!(
    EchoTool,
    "echo",
    "Echoes the input text back. Useful for testing and confirming values.",
    Read,
    serde_json::json!({
        "type": "object",
        "properties": {
            "text": {
                "type": "string",
                "description": "The text to echo back"
            }
        },
        "required": ["text"]
    }),
    |args| {
        let text = args["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments {
                name: "echo".to_string(),
                reason: "missing required 'text' parameter".to_string(),
            })?;
        Ok(ToolOutput::text(text.to_string()))
    }
);

define_tool!(
    DateTimeTool,
    "datetime",
    "Returns the current date and time in the specified format (default: RFC 3339).",
    Read,
    serde_json::json!({
        "type": "object",
        "properties": {
            "format": {
                "type": "string",
                "description": "strftime format string (default: RFC 3339)"
            }
        }
    }),
    |args| {
        let now = chrono::Utc::now();
        let formatted = if let Some(fmt) = args.get("format").and_then(|f| f.as_str()) {
            now.format(fmt).to_string()
        } else {
            now.to_rfc3339()
        };
        Ok(ToolOutput::text(formatted))
    }
);
