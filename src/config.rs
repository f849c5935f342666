use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub survey: SurveyConfig,
    pub email: EmailConfig,
    #[serde(default)]
    pub lottery: LotteryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

/// 问卷提供方回调配置。hash = md5(user_id + secret)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    pub callback_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmailConfig {
    #[serde(default)]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub enabled: bool,
}

/// 开奖日程与默认奖金。
/// 默认: 每周四 18:30, IST (UTC+05:30), 奖金 500 卢比。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryConfig {
    #[serde(default = "default_draw_weekday")]
    pub draw_weekday: u8, // 0 = 周一 ... 6 = 周日
    #[serde(default = "default_draw_hour")]
    pub draw_hour: u32,
    #[serde(default = "default_draw_minute")]
    pub draw_minute: u32,
    #[serde(default = "default_tz_offset_minutes")]
    pub tz_offset_minutes: i32,
    #[serde(default = "default_prize_paise")]
    pub default_prize_paise: i64,
}

fn default_draw_weekday() -> u8 {
    3 // Thursday
}
fn default_draw_hour() -> u32 {
    18
}
fn default_draw_minute() -> u32 {
    30
}
fn default_tz_offset_minutes() -> i32 {
    330 // IST = UTC+05:30
}
fn default_prize_paise() -> i64 {
    50_000 // ₹500
}

impl Default for LotteryConfig {
    fn default() -> Self {
        Self {
            draw_weekday: default_draw_weekday(),
            draw_hour: default_draw_hour(),
            draw_minute: default_draw_minute(),
            tz_offset_minutes: default_tz_offset_minutes(),
            default_prize_paise: default_prize_paise(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 无配置文件：使用环境变量与默认值构建
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            2_592_000i64,
                        ),
                    },
                    survey: SurveyConfig {
                        callback_secret: get_env("SURVEY_CALLBACK_SECRET").unwrap_or_default(),
                    },
                    email: EmailConfig {
                        api_url: get_env("EMAIL_API_URL").unwrap_or_default(),
                        api_key: get_env("EMAIL_API_KEY").unwrap_or_default(),
                        from_address: get_env("EMAIL_FROM_ADDRESS").unwrap_or_default(),
                        enabled: get_env_parse("EMAIL_ENABLED", false),
                    },
                    lottery: LotteryConfig {
                        draw_weekday: get_env_parse("LOTTERY_DRAW_WEEKDAY", 3u8),
                        draw_hour: get_env_parse("LOTTERY_DRAW_HOUR", 18u32),
                        draw_minute: get_env_parse("LOTTERY_DRAW_MINUTE", 30u32),
                        tz_offset_minutes: get_env_parse("LOTTERY_TZ_OFFSET_MINUTES", 330i32),
                        default_prize_paise: get_env_parse("LOTTERY_DEFAULT_PRIZE_PAISE", 50_000i64),
                    },
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        // 环境变量覆盖（即便文件存在时也覆盖）
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.refresh_token_expires_in = n;
        }
        if let Ok(v) = env::var("SURVEY_CALLBACK_SECRET") {
            config.survey.callback_secret = v;
        }
        if let Ok(v) = env::var("EMAIL_API_URL") {
            config.email.api_url = v;
        }
        if let Ok(v) = env::var("EMAIL_API_KEY") {
            config.email.api_key = v;
        }
        if let Ok(v) = env::var("EMAIL_FROM_ADDRESS") {
            config.email.from_address = v;
        }
        if let Ok(v) = env::var("EMAIL_ENABLED")
            && let Ok(b) = v.parse()
        {
            config.email.enabled = b;
        }
        if let Ok(v) = env::var("LOTTERY_DRAW_WEEKDAY")
            && let Ok(n) = v.parse()
        {
            config.lottery.draw_weekday = n;
        }
        if let Ok(v) = env::var("LOTTERY_DRAW_HOUR")
            && let Ok(n) = v.parse()
        {
            config.lottery.draw_hour = n;
        }
        if let Ok(v) = env::var("LOTTERY_DRAW_MINUTE")
            && let Ok(n) = v.parse()
        {
            config.lottery.draw_minute = n;
        }
        if let Ok(v) = env::var("LOTTERY_TZ_OFFSET_MINUTES")
            && let Ok(n) = v.parse()
        {
            config.lottery.tz_offset_minutes = n;
        }
        if let Ok(v) = env::var("LOTTERY_DEFAULT_PRIZE_PAISE")
            && let Ok(n) = v.parse()
        {
            config.lottery.default_prize_paise = n;
        }

        Ok(config)
    }
}
