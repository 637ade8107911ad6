//! Workspace-wide constants and defaults.

/// Prefix of provider pseudo parameters such as `AWS::Region`.
pub const DEFAULT_PSEUDO_PARAMETER_PREFIX: &str = "AWS::";

/// Maximum number of resources a single manifest may declare.
pub const DEFAULT_MAX_RESOURCES: usize = 500;

/// Maximum number of outputs a single manifest may declare.
pub const DEFAULT_MAX_OUTPUTS: usize = 200;

/// Resource-level attributes accepted next to `Type` and `Properties`.
pub const RESOURCE_ATTRIBUTES: &[&str] = &[
    "Type",
    "Properties",
    "DependsOn",
    "Metadata",
    "Condition",
    "DeletionPolicy",
    "UpdateReplacePolicy",
    "CreationPolicy",
    "UpdatePolicy",
];

/// Environment variable naming a JSON planner configuration file.
pub const CONFIG_ENV_VAR: &str = "STACKPLAN_CONFIG";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "stackplan";
