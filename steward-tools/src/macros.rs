//! Tool definition macro — reduces boilerplate when implementing `Tool`.
//!
//! ```rust,ignore
//! define_tool!(
//!     MyTool,
//!     "my_tool",
//!     "Does something useful.",
//!     Read,
//!     serde_json::json!({
//!         "type": "object",
//!         "properties": {
//!             "input": { "type": "string", "description": "The input" }
//!         },
//!         "required": ["input"]
//!     }),
//!     |args| {
//!         let input = args["input"]
//!             .as_str()
//!             .ok_or_else(|| ToolError::InvalidArguments {
//!                 name: "my_tool".to_string(),
//!                 reason: "missing 'input'".to_string(),
//!             })?;
//!         Ok(ToolOutput::text(input.to_string()))
//!     }
//! );
//! ```
//!
//! A second form accepts named struct fields and a `|self_, args|` closure.

/// Define a tool with minimal boilerplate.
///
/// Generates the struct definition (unit or with named fields) and the
/// `#[async_trait]` impl of `crate::registry::Tool` with all required
/// methods. The closure body must return `Result<ToolOutput, ToolError>`.
#[macro_export]
macro_rules! define_tool {
    // ── Case 1: Unit struct (no fields) ──────────────────────────────────
    (
        $name:ident,
        $tool_name:expr,
        $desc:expr,
        $risk:ident,
        $schema:expr,
        |$args:ident| $body:expr
    ) => {
        pub struct $name;

        #[async_trait::async_trait]
        impl $crate::registry::Tool for $name {
            fn name(&self) -> &str {
                $tool_name
            }

            fn description(&self) -> &str {
                $desc
            }

            fn parameters_schema(&self) -> serde_json::Value {
                $schema
            }

            fn risk_level(&self) -> steward_core::types::RiskLevel {
                steward_core::types::RiskLevel::$risk
            }

            async fn execute(
                &self,
                $args: serde_json::Value,
            ) -> Result<steward_core::types::ToolOutput, steward_core::error::ToolError> {
                $body
            }
        }
    };

    // ── Case 2: Struct with fields ───────────────────────────────────────
    (
        $name:ident { $($field:ident : $ftype:ty),* $(,)? },
        $tool_name:expr,
        $desc:expr,
        $risk:ident,
        $schema:expr,
        |$self_:ident, $args:ident| $body:expr
    ) => {
        pub struct $name {
            $(pub $field: $ftype),*
        }

        #[async_trait::async_trait]
        impl $crate::registry::Tool for $name {
            fn name(&self) -> &str {
                $tool_name
            }

            fn description(&self) -> &str {
                $desc
            }

            fn parameters_schema(&self) -> serde_json::Value {
                $schema
            }

            fn risk_level(&self) -> steward_core::types::RiskLevel {
                steward_core::types::RiskLevel::$risk
            }

            async fn execute(
                &self,
                $args: serde_json::Value,
            ) -> Result<steward_core::types::ToolOutput, steward_core::error::ToolError> {
                let $self_ = self;
                $body
            }
        }
    };
}
