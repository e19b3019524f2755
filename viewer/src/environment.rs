use once_cell::sync::Lazy;

#[derive(serde::Deserialize, Debug)]
pub struct Env {
    #[serde(default = "default_environment_name")]
    pub environment_name: String,
}

fn default_environment_name() -> String {
    "local".to_owned()
}

#[derive(serde::Deserialize, Debug)]
pub struct Sentry {
    pub dsn: Option<String>,
}

// a malformed value only disables error reporting
pub static ENV: Lazy<Env> = Lazy::new(|| {
    envy::prefixed("ENV_").from_env::<Env>().unwrap_or_else(|_| Env {
        environment_name: default_environment_name(),
    })
});

pub static SENTRY: Lazy<Sentry> =
    Lazy::new(|| envy::prefixed("SENTRY_").from_env::<Sentry>().unwrap_or(Sentry { dsn: None }));
