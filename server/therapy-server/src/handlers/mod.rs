pub mod admin;
pub mod catalog;
pub mod exercises;
pub mod health;
pub mod progress;
pub mod trials;

use serde::Deserialize;
use therapy_progress::{ModuleKey, ModuleType};

use crate::error::ApiResult;

/// `?sub_mode=` on module-scoped routes
#[derive(Debug, Default, Deserialize)]
pub struct ModuleQuery {
    pub sub_mode: Option<String>,
}

/// Parse a module path/form value plus optional sub-mode into a key
pub(crate) fn module_key(module: &str, sub_mode: Option<&str>) -> ApiResult<ModuleKey> {
    let module_type: ModuleType = module.parse()?;
    Ok(ModuleKey::new(module_type, sub_mode)?)
}
