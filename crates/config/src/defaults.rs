pub fn default_enabled() -> bool {
    true
}

pub fn default_station_name() -> String {
    "weatherhub".to_string()
}

pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

pub fn default_http_port() -> u16 {
    3000
}

pub fn default_request_timeout() -> u64 {
    30
}

pub fn default_database_url() -> String {
    "sqlite://weather_data.db".to_string()
}

pub fn default_max_connections() -> u32 {
    5
}

pub fn default_window() -> String {
    "5m".to_string()
}

pub fn default_check_interval() -> u64 {
    60
}

pub fn default_min_spacing() -> u64 {
    240
}

pub fn default_history_limit() -> usize {
    12
}

pub fn default_history_max() -> usize {
    1000
}

pub fn default_raw_lookback_minutes() -> u64 {
    45
}

pub fn default_broker_host() -> String {
    "broker.hivemq.com".to_string()
}

pub fn default_broker_port() -> u16 {
    1883
}

pub fn default_client_id() -> String {
    "weatherhub-ingest".to_string()
}

pub fn default_temperature_topic() -> String {
    "weatherhub/temperature".to_string()
}

pub fn default_humidity_topic() -> String {
    "weatherhub/humidity".to_string()
}

pub fn default_keep_alive() -> u64 {
    30
}

pub fn default_reconnect_delay() -> u64 {
    5
}

pub fn default_viewer_row_limit() -> usize {
    100
}

pub fn default_viewer_refresh() -> u64 {
    30
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}
