/// Named databases inside the LMDB environment
pub mod db_names {
    pub const CHECKPOINTS: &str = "checkpoints";
}

/// Maximum key length LMDB accepts with default build options
pub const MAX_KEY_LEN: usize = 511;

/// Reject keys LMDB cannot store
pub fn validate_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN
}
