// Stable error codes returned in API error bodies

pub mod validation {
    pub const INVALID_INPUT: &str = "VALIDATION_1001";
    pub const MISSING_REQUIRED_FIELD: &str = "VALIDATION_1002";
    pub const INVALID_SCORE_RANGE: &str = "VALIDATION_1003";
}

pub mod authentication {
    pub const MISSING_TOKEN: &str = "AUTH_2001";
    pub const INVALID_TOKEN: &str = "AUTH_2002";
}

pub mod authorization {
    pub const ACCESS_DENIED: &str = "AUTHZ_3001";
}

pub mod storage {
    pub const UNAVAILABLE: &str = "STORAGE_4001";
}

pub mod assessment {
    pub const NO_SPEECH_DETECTED: &str = "ASSESS_5001";
    pub const SERVICE_UNAVAILABLE: &str = "ASSESS_5002";
    pub const NOT_CONFIGURED: &str = "ASSESS_5003";
    pub const INVALID_AUDIO: &str = "ASSESS_5004";
}

pub mod resource {
    pub const NOT_FOUND: &str = "RESOURCE_6001";
    pub const ALREADY_EXISTS: &str = "RESOURCE_6002";
}

pub mod internal {
    pub const INTERNAL_ERROR: &str = "INTERNAL_9001";
}
