//! Default values for optional configuration keys

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_port() -> u16 {
    8000
}

pub fn default_max_connections() -> usize {
    1024
}

pub fn default_ring_capacity() -> usize {
    100_000
}

pub fn default_max_message_len() -> usize {
    4096
}

pub fn default_max_bytes_per_read() -> usize {
    100_000
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}
