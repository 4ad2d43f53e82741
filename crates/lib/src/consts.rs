/// Application name used for data directories.
pub const APP_NAME: &str = "stackup";

/// Length of the truncated hex digest used by [`crate::util::hash::ObjectHash`].
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Version of the persisted applied-state format.
pub const STATE_VERSION: u32 = 1;

/// Default configuration file name.
pub const DEFAULT_CONFIG: &str = "stack.lua";

/// Metatable marker for reference tables created from Lua.
pub const RESOURCE_REF_TYPE: &str = "ResourceRef";
