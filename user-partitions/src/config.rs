use std::ops::Deref;
use std::path::PathBuf;
use std::str::FromStr;

use envconfig::Envconfig;

use crate::schemes::DEFAULT_SCHEME_NAME;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexBool(pub bool);

impl FromStr for FlexBool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(FlexBool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(FlexBool(false)),
            _ => Err(format!("Invalid boolean value: {}", s)),
        }
    }
}

impl Deref for FlexBool {
    type Target = bool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(from = "PARTITIONS_PATH", default = "partitions.json")]
    pub partitions_path: PathBuf,

    #[envconfig(from = "COURSE_ID", default = "course-v1:edX+DemoX+Demo_Course")]
    pub course_id: String,

    #[envconfig(from = "USER_ID", default = "1")]
    pub user_id: i64,

    #[envconfig(from = "USERNAME", default = "demo")]
    pub username: String,

    // Bound to partitions that don't name a scheme.
    #[envconfig(from = "DEFAULT_SCHEME", default = "random")]
    pub default_scheme: String,

    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: FlexBool,
}

impl Config {
    pub fn default_test_config() -> Self {
        Self {
            partitions_path: PathBuf::from("partitions.json"),
            course_id: "course-v1:edX+DemoX+Demo_Course".to_string(),
            user_id: 1,
            username: "demo".to_string(),
            default_scheme: DEFAULT_SCHEME_NAME.to_string(),
            debug: FlexBool(false),
        }
    }
}
