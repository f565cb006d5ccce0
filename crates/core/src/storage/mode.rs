use std::fmt;
use std::str::FromStr;

/// Which storage engine backs the process. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendMode {
    /// In-process, file-backed engine.
    Embedded,
    /// Networked relational server mirrored by the table cache.
    Remote,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Embedded => "embedded",
            BackendMode::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "embedded" | "sqlite" | "local" => Ok(BackendMode::Embedded),
            "remote" | "postgres" | "postgresql" => Ok(BackendMode::Remote),
            other => Err(format!("unknown backend mode: {other}")),
        }
    }
}

const NETWORKED_SCHEMES: [&str; 2] = ["postgres://", "postgresql://"];

/// Returns true if the connection string names a networked database server.
pub fn is_networked_url(url: &str) -> bool {
    let url = url.trim();
    NETWORKED_SCHEMES.iter().any(|scheme| {
        url.len() > scheme.len()
            && url
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    })
}

/// Chooses the backend from the configured connection string.
///
/// Remote only when the value is present and recognized; everything else,
/// including an empty string, falls back to the embedded engine.
pub fn select_backend(database_url: Option<&str>) -> BackendMode {
    match database_url {
        Some(url) if is_networked_url(url) => BackendMode::Remote,
        _ => BackendMode::Embedded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_selects_embedded() {
        assert_eq!(select_backend(None), BackendMode::Embedded);
        assert_eq!(select_backend(Some("")), BackendMode::Embedded);
        assert_eq!(select_backend(Some("   ")), BackendMode::Embedded);
    }

    #[test]
    fn test_postgres_urls_select_remote() {
        assert_eq!(
            select_backend(Some("postgres://user:pw@db.internal:5432/booking")),
            BackendMode::Remote
        );
        assert_eq!(
            select_backend(Some("POSTGRESQL://localhost/booking")),
            BackendMode::Remote
        );
    }

    #[test]
    fn test_unrecognized_urls_select_embedded() {
        assert_eq!(select_backend(Some("sqlite://data/booking.db")), BackendMode::Embedded);
        assert_eq!(select_backend(Some("mysql://localhost/booking")), BackendMode::Embedded);
        assert_eq!(select_backend(Some("postgres://")), BackendMode::Embedded);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("remote".parse::<BackendMode>(), Ok(BackendMode::Remote));
        assert_eq!(" Embedded ".parse::<BackendMode>(), Ok(BackendMode::Embedded));
        assert!("cloud".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(BackendMode::Remote.to_string(), "remote");
        assert_eq!(BackendMode::Embedded.to_string(), "embedded");
    }
}
