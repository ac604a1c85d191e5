use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Code pool backends
///
/// `Postgres` is the durable store. `Memory` keeps the pool in process and
/// loses it on restart; it exists for local development and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolBackend {
    Postgres,
    Memory,
}

impl FromStr for PoolBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(PoolBackend::Postgres),
            "memory" => Ok(PoolBackend::Memory),
            _ => Err(anyhow::anyhow!("Invalid pool backend: {}", s)),
        }
    }
}

impl Display for PoolBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PoolBackend::Postgres => write!(f, "postgres"),
            PoolBackend::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pool_backend() {
        assert_eq!("postgres".parse::<PoolBackend>().unwrap(), PoolBackend::Postgres);
        assert_eq!("PostgreSQL".parse::<PoolBackend>().unwrap(), PoolBackend::Postgres);
        assert_eq!("memory".parse::<PoolBackend>().unwrap(), PoolBackend::Memory);
        assert!("redis".parse::<PoolBackend>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for backend in [PoolBackend::Postgres, PoolBackend::Memory] {
            assert_eq!(backend.to_string().parse::<PoolBackend>().unwrap(), backend);
        }
    }
}
