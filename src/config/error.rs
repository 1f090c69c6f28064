use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error loading config: `{0}`")]
    Io(#[from] std::io::Error),

    #[error("error loading config: `{0}`")]
    Decode(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
