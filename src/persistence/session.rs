/// Session factory: a PostgreSQL pool bound to the named SQL statements
/// found under the configured mapper location.
///
/// Mapper files hold one or more statements, each introduced by a
/// `-- name: <ident>` line. A statement is registered as
/// `<file stem>.<ident>`, so `mappers/user_token.sql` with
/// `-- name: upsert` yields `user_token.upsert`.
///
/// Everything here runs once at startup; any error aborts boot.

use regex::Regex;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::configuration::{DatabaseSettings, MapperSettings};
use crate::error::{AppError, ConfigError, DatabaseError};

const NAME_MARKER: &str = "-- name:";
const LOCATION_PREFIXES: [&str; 2] = ["classpath:", "file:"];

/// Resolve a `<directory>/<file glob>` pattern into the matching files.
///
/// `*` and `?` are only honoured in the file-name part. A missing
/// directory or a pattern matching nothing is an error.
pub fn resolve_mapper_locations(pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let mut location = pattern.trim();
    for prefix in LOCATION_PREFIXES {
        if let Some(rest) = location.strip_prefix(prefix) {
            location = rest;
        }
    }
    if location.is_empty() {
        return Err(ConfigError::MissingRequired("mapper.locations".to_string()));
    }

    let path = Path::new(location);
    let file_glob = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ConfigError::MapperLocation(format!("{}: no file pattern", pattern)))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if dir.to_string_lossy().contains(['*', '?']) {
        return Err(ConfigError::MapperLocation(format!(
            "{}: wildcards are only supported in the file name",
            pattern
        )));
    }

    let matcher = glob_to_regex(file_glob)?;
    let entries = fs::read_dir(dir)
        .map_err(|e| ConfigError::MapperLocation(format!("{}: {}", dir.display(), e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| ConfigError::MapperLocation(format!("{}: {}", dir.display(), e)))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| matcher.is_match(name))
        {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ConfigError::MapperLocation(format!(
            "{} matched no files",
            pattern
        )));
    }
    files.sort();
    Ok(files)
}

fn glob_to_regex(glob: &str) -> Result<Regex, ConfigError> {
    let mut expr = String::from("^");
    for c in glob.chars() {
        match c {
            '*' => expr.push_str("[^/]*"),
            '?' => expr.push_str("[^/]"),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|e| ConfigError::MapperLocation(format!("{}: {}", glob, e)))
}

fn is_statement_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Named SQL statements, keyed `<namespace>.<name>`
#[derive(Debug, Default)]
pub struct MapperRegistry {
    statements: HashMap<String, String>,
}

impl MapperRegistry {
    /// Load every file matched by `pattern`
    pub fn load(pattern: &str) -> Result<Self, ConfigError> {
        let mut registry = Self::default();
        for file in resolve_mapper_locations(pattern)? {
            let namespace = file
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| {
                    ConfigError::MapperLocation(format!("{}: bad file name", file.display()))
                })?
                .to_string();
            let source = fs::read_to_string(&file)
                .map_err(|e| ConfigError::MapperLocation(format!("{}: {}", file.display(), e)))?;

            registry.register(&namespace, &source)?;
            tracing::debug!(file = %file.display(), namespace = %namespace, "Mapper file loaded");
        }
        Ok(registry)
    }

    fn register(&mut self, namespace: &str, source: &str) -> Result<(), ConfigError> {
        let mut current: Option<(String, String)> = None;

        for (index, line) in source.lines().enumerate() {
            let trimmed = line.trim();
            if let Some(rest) = trimmed.strip_prefix(NAME_MARKER) {
                if let Some((name, body)) = current.take() {
                    self.insert(namespace, name, body)?;
                }
                let name = rest.trim();
                if !is_statement_name(name) {
                    return Err(ConfigError::ParseError(format!(
                        "{}:{}: invalid statement name '{}'",
                        namespace,
                        index + 1,
                        name
                    )));
                }
                current = Some((name.to_string(), String::new()));
                continue;
            }

            match current.as_mut() {
                Some((_, body)) => {
                    body.push_str(line);
                    body.push('\n');
                }
                None if trimmed.is_empty() || trimmed.starts_with("--") => {}
                None => {
                    return Err(ConfigError::ParseError(format!(
                        "{}:{}: SQL outside of a named statement",
                        namespace,
                        index + 1
                    )));
                }
            }
        }

        if let Some((name, body)) = current {
            self.insert(namespace, name, body)?;
        }
        Ok(())
    }

    fn insert(&mut self, namespace: &str, name: String, body: String) -> Result<(), ConfigError> {
        let key = format!("{}.{}", namespace, name);
        let sql = body.trim();
        if sql.is_empty() {
            return Err(ConfigError::ParseError(format!("{} is empty", key)));
        }
        if self.statements.contains_key(&key) {
            return Err(ConfigError::ParseError(format!("{} is defined twice", key)));
        }
        self.statements.insert(key, sql.to_string());
        Ok(())
    }

    pub fn statement(&self, name: &str) -> Result<&str, DatabaseError> {
        self.statements
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| DatabaseError::MissingStatement(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Pool plus mapped statements, shared through `web::Data`
#[derive(Clone)]
pub struct SessionFactory {
    pool: PgPool,
    registry: Arc<MapperRegistry>,
}

impl SessionFactory {
    /// Bind an existing pool to the statements under `mapper_locations`
    pub fn build(pool: PgPool, mapper_locations: &str) -> Result<Self, ConfigError> {
        let registry = MapperRegistry::load(mapper_locations)?;
        tracing::info!(
            locations = mapper_locations,
            statements = registry.len(),
            "Mapper statements registered"
        );
        Ok(Self {
            pool,
            registry: Arc::new(registry),
        })
    }

    /// Connect eagerly, so an unreachable database fails at startup
    pub async fn connect(
        database: &DatabaseSettings,
        mapper: &MapperSettings,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(database.max_connections)
            .connect(&database.connection_string())
            .await?;

        Ok(Self::build(pool, &mapper.locations)?)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn statement(&self, name: &str) -> Result<&str, DatabaseError> {
        self.registry.statement(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mappers_pattern() -> String {
        format!("{}/mappers/*.sql", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_resolves_bundled_mappers() {
        let files = resolve_mapper_locations(&mappers_pattern()).unwrap();
        let names: Vec<_> = files
            .iter()
            .filter_map(|f| f.file_name().and_then(|n| n.to_str()))
            .collect();

        assert_eq!(names, vec!["user.sql", "user_token.sql"]);
    }

    #[test]
    fn test_classpath_prefix_is_stripped() {
        let pattern = format!("classpath:{}", mappers_pattern());
        assert_eq!(resolve_mapper_locations(&pattern).unwrap().len(), 2);
    }

    #[test]
    fn test_pattern_matching_nothing_is_an_error() {
        let pattern = format!("{}/mappers/*.xml", env!("CARGO_MANIFEST_DIR"));
        assert!(matches!(
            resolve_mapper_locations(&pattern),
            Err(ConfigError::MapperLocation(_))
        ));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        assert!(matches!(
            resolve_mapper_locations("no/such/dir/*.sql"),
            Err(ConfigError::MapperLocation(_))
        ));
    }

    #[test]
    fn test_wildcard_in_directory_is_rejected() {
        assert!(matches!(
            resolve_mapper_locations("mappers/*/user.sql"),
            Err(ConfigError::MapperLocation(_))
        ));
    }

    #[test]
    fn test_glob_matches_whole_file_name() {
        let matcher = glob_to_regex("user?.sql").unwrap();
        assert!(matcher.is_match("users.sql"));
        assert!(!matcher.is_match("user.sql"));
        assert!(!matcher.is_match("users.sqlx"));
    }

    #[test]
    fn test_bundled_registry_has_token_and_user_statements() {
        let registry = MapperRegistry::load(&mappers_pattern()).unwrap();

        assert!(registry.statement("user_token.find_by_access_token").is_ok());
        assert!(registry.statement("user_token.upsert").is_ok());
        assert!(registry.statement("user.find_credentials").is_ok());
        assert!(matches!(
            registry.statement("user.delete_everything"),
            Err(DatabaseError::MissingStatement(_))
        ));
    }

    #[test]
    fn test_register_splits_statements_on_name_markers() {
        let mut registry = MapperRegistry::default();
        let source = "-- mapper header\n\n-- name: first\nSELECT 1\n\n-- name: second\nSELECT 2;\n";
        registry.register("demo", source).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.statement("demo.first").unwrap(), "SELECT 1");
        assert_eq!(registry.statement("demo.second").unwrap(), "SELECT 2;");
    }

    #[test]
    fn test_register_rejects_sql_before_first_marker() {
        let mut registry = MapperRegistry::default();
        let result = registry.register("demo", "SELECT 1;\n-- name: first\nSELECT 2\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_register_rejects_empty_and_duplicate_statements() {
        let mut registry = MapperRegistry::default();
        assert!(registry.register("demo", "-- name: empty\n\n").is_err());

        let mut registry = MapperRegistry::default();
        let source = "-- name: twice\nSELECT 1\n-- name: twice\nSELECT 2\n";
        assert!(registry.register("demo", source).is_err());
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let mut registry = MapperRegistry::default();
        assert!(registry.register("demo", "-- name: has space\nSELECT 1\n").is_err());
    }
}
