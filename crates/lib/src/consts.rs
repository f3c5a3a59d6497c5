/// Application name used for default data directories.
pub const APP_NAME: &str = "imagebuilder";

/// Reserved parameter key accepted by the resolver even though no manifest declares it.
pub const DEBUG_PARAMETERS_KEY: &str = "_WFDebugParams_";

/// Suffix appended to a store key to address its recorded checksum.
pub const CHECKSUM_SUFFIX: &str = ".checksum";

/// Application name used when validating a type without creating a real instance.
pub const MOCK_APPLICATION_NAME: &str = "fabric:/mock_app_for_validation";

/// Application id used together with [`MOCK_APPLICATION_NAME`].
pub const MOCK_APPLICATION_ID: &str = "mock_app_for_validation_App0";

/// URI scheme every application name must use.
pub const APPLICATION_NAME_SCHEME: &str = "fabric";

/// Prefix reserved for application types generated from compose deployments.
pub const COMPOSE_TYPE_PREFIX: &str = "Compose_";

/// Character that may never appear in a security principal name.
pub const PRINCIPAL_NAME_FORBIDDEN_CHAR: char = '|';

/// File names inside a local build layout.
pub const APPLICATION_MANIFEST_FILE: &str = "ApplicationManifest.json";
pub const SERVICE_MANIFEST_FILE: &str = "ServiceManifest.json";

/// Default overall budget for a public operation.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Environment variables overriding [`crate::config::BuilderConfig`] defaults.
pub const STORE_ENV_VAR: &str = "IMAGEBUILDER_STORE";
pub const TIMEOUT_ENV_VAR: &str = "IMAGEBUILDER_TIMEOUT_SECS";
