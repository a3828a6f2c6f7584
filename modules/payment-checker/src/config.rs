//! Environment configuration, loaded once at startup.

fn get_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn require_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| panic!("{key} must be set"))
}

pub struct Config {
    pub app_port: u16,

    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_sslmode: String,

    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: Option<String>,

    pub kafka_host: String,
    pub kafka_port: u16,
    pub kafka_topic_payment_success: String,

    pub payment_server_base_url: String,
    pub payment_server_api_key: String,

    pub telemetry_enabled: bool,
    pub telemetry_api_key: Option<String>,
    pub telemetry_endpoint: Option<String>,

    pub env: String,

    /// The shared secret the admin bearer middleware checks against.
    pub admin_api_key: String,

    /// "inmemory" (test/dev) or "kafka" (production).
    pub bus_type: String,
}

impl Config {
    pub fn load() -> Self {
        dotenvy::dotenv().ok();

        Self {
            app_port: get_env("APP_PORT", "8088").parse().expect("APP_PORT must be a valid u16"),

            db_host: get_env("DB_HOST", "localhost"),
            db_port: get_env("DB_PORT", "5432").parse().expect("DB_PORT must be a valid u16"),
            db_user: get_env("DB_USER", "postgres"),
            db_password: require_env("DB_PASSWORD"),
            db_name: get_env("DB_NAME", "payment_checker"),
            db_sslmode: get_env("DB_SSLMODE", "disable"),

            redis_host: get_env("REDIS_HOST", "localhost"),
            redis_port: get_env("REDIS_PORT", "6379").parse().expect("REDIS_PORT must be a valid u16"),
            redis_password: std::env::var("REDIS_PASSWORD").ok(),

            kafka_host: get_env("KAFKA_HOST", "localhost"),
            kafka_port: get_env("KAFKA_PORT", "9092").parse().expect("KAFKA_PORT must be a valid u16"),
            kafka_topic_payment_success: get_env("KAFKA_TOPIC_PAYMENT_SUCCESS", "payment.completed"),

            payment_server_base_url: require_env("PAYMENT_SERVER_BASE_URL"),
            payment_server_api_key: require_env("PAYMENT_SERVER_API_KEY"),

            telemetry_enabled: get_env("TELEMETRY_ENABLED", "false") == "true",
            telemetry_api_key: std::env::var("TELEMETRY_API_KEY").ok(),
            telemetry_endpoint: std::env::var("TELEMETRY_ENDPOINT").ok(),

            env: get_env("ENV", "development"),

            admin_api_key: require_env("ADMIN_API_KEY"),
            bus_type: get_env("BUS_TYPE", "inmemory"),
        }
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name, self.db_sslmode
        )
    }

    pub fn redis_url(&self) -> String {
        match &self.redis_password {
            Some(password) => format!("redis://:{}@{}:{}", password, self.redis_host, self.redis_port),
            None => format!("redis://{}:{}", self.redis_host, self.redis_port),
        }
    }

    pub fn kafka_bootstrap_servers(&self) -> String {
        format!("{}:{}", self.kafka_host, self.kafka_port)
    }
}
