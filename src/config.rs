use std::net::{Ipv4Addr, SocketAddr};

use thiserror::Error;

const DEFAULT_PORT: u16 = 3001;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be set when VECTOR_DB={backend}")]
    Missing {
        var: &'static str,
        backend: &'static str,
    },
    #[error("{var} has an invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorDbConfig {
    Pinecone(PineconeConfig),
    Memory { dimension: Option<usize> },
}

impl VectorDbConfig {
    pub fn backend(&self) -> &'static str {
        match self {
            VectorDbConfig::Pinecone(_) => "pinecone",
            VectorDbConfig::Memory { .. } => "memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PineconeConfig {
    pub api_key: String,
    pub environment: Option<String>,
    pub index: Option<String>,
    pub index_host: Option<String>,
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub auth_token: Option<String>,
    pub vector_db: VectorDbConfig,
}

impl ServerConfig {
    /// Reads the process environment, falling back to `.env` in the working directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("SERVER_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                var: "SERVER_PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let backend = get("VECTOR_DB").unwrap_or_else(|| "pinecone".to_string());
        let vector_db = match backend.trim().to_ascii_lowercase().as_str() {
            "pinecone" => {
                let api_key = get("PINECONE_API_KEY").ok_or(ConfigError::Missing {
                    var: "PINECONE_API_KEY",
                    backend: "pinecone",
                })?;
                let environment = get("PINECONE_ENVIRONMENT");
                let index = get("PINECONE_INDEX");
                let index_host = get("PINECONE_INDEX_HOST");

                if index_host.is_none() {
                    if environment.is_none() {
                        return Err(ConfigError::Missing {
                            var: "PINECONE_ENVIRONMENT",
                            backend: "pinecone",
                        });
                    }
                    if index.is_none() {
                        return Err(ConfigError::Missing {
                            var: "PINECONE_INDEX",
                            backend: "pinecone",
                        });
                    }
                }

                VectorDbConfig::Pinecone(PineconeConfig {
                    api_key,
                    environment,
                    index,
                    index_host,
                })
            }
            "memory" => {
                let dimension = match get("MEMORY_VECTOR_DIMENSION") {
                    Some(raw) => {
                        let dim = raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                            var: "MEMORY_VECTOR_DIMENSION",
                            value: raw.clone(),
                            reason: e.to_string(),
                        })?;
                        if dim == 0 {
                            return Err(ConfigError::Invalid {
                                var: "MEMORY_VECTOR_DIMENSION",
                                value: raw,
                                reason: "dimension must be positive".into(),
                            });
                        }
                        Some(dim)
                    }
                    None => None,
                };
                VectorDbConfig::Memory { dimension }
            }
            other => {
                return Err(ConfigError::Invalid {
                    var: "VECTOR_DB",
                    value: other.to_string(),
                    reason: "expected `pinecone` or `memory`".into(),
                })
            }
        };

        Ok(Self {
            port,
            auth_token: get("AUTH_TOKEN"),
            vector_db,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_port_and_requires_pinecone_key() {
        let err = ServerConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                var: "PINECONE_API_KEY",
                ..
            }
        ));

        let cfg = ServerConfig::from_lookup(lookup(&[("VECTOR_DB", "memory")])).unwrap();
        assert_eq!(cfg.port, 3001);
        assert_eq!(cfg.listen_addr().to_string(), "0.0.0.0:3001");
        assert_eq!(cfg.vector_db, VectorDbConfig::Memory { dimension: None });
        assert!(cfg.auth_token.is_none());
    }

    #[test]
    fn rejects_non_numeric_port() {
        let err = ServerConfig::from_lookup(lookup(&[
            ("VECTOR_DB", "memory"),
            ("SERVER_PORT", "abc"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "SERVER_PORT", .. }));
    }

    #[test]
    fn pinecone_needs_environment_and_index_without_host() {
        let err = ServerConfig::from_lookup(lookup(&[("PINECONE_API_KEY", "k")])).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                var: "PINECONE_ENVIRONMENT",
                ..
            }
        ));

        let cfg = ServerConfig::from_lookup(lookup(&[
            ("PINECONE_API_KEY", "k"),
            ("PINECONE_INDEX_HOST", "https://idx.example"),
            ("SERVER_PORT", "8080"),
            ("AUTH_TOKEN", "secret"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.auth_token.as_deref(), Some("secret"));
        assert_eq!(cfg.vector_db.backend(), "pinecone");
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = ServerConfig::from_lookup(lookup(&[
            ("VECTOR_DB", "memory"),
            ("AUTH_TOKEN", "  "),
            ("MEMORY_VECTOR_DIMENSION", "3"),
        ]))
        .unwrap();
        assert!(cfg.auth_token.is_none());
        assert_eq!(cfg.vector_db, VectorDbConfig::Memory { dimension: Some(3) });
    }
}
