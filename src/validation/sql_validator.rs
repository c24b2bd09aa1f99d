use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use super::GuardError;

/// Read-only check for generated SQL
pub struct SqlValidator;

impl SqlValidator {
    /// Validate SQL query and ensure it only contains SELECT statements
    pub fn validate_select_only(sql: &str) -> Result<(), GuardError> {
        let dialect = PostgreSqlDialect {};
        let mut parser = Parser::new(&dialect)
            .try_with_sql(sql)
            .map_err(|e| GuardError::Parse(format!("SQL parsing error: {}", e)))?;

        let ast = parser
            .parse_statements()
            .map_err(|e| GuardError::Parse(format!("SQL parsing error: {}", e)))?;

        if ast.is_empty() {
            return Err(GuardError::Empty);
        }

        for stmt in ast {
            match stmt {
                Statement::Query(query) => Self::check_query(&query)?,
                Statement::Insert { .. } => return Err(GuardError::forbidden("INSERT")),
                Statement::Update { .. } => return Err(GuardError::forbidden("UPDATE")),
                Statement::Delete { .. } => return Err(GuardError::forbidden("DELETE")),
                Statement::Drop { .. } => return Err(GuardError::forbidden("DROP")),
                Statement::CreateTable { .. } => return Err(GuardError::forbidden("CREATE TABLE")),
                Statement::AlterTable { .. } => return Err(GuardError::forbidden("ALTER TABLE")),
                other => {
                    let keyword = other
                        .to_string()
                        .split_whitespace()
                        .next()
                        .unwrap_or("UNKNOWN")
                        .to_uppercase();
                    return Err(GuardError::forbidden(keyword));
                }
            }
        }

        Ok(())
    }

    /// Reject writes nested inside a query: data-modifying CTEs,
    /// `SELECT ... INTO` and row locks
    fn check_query(query: &Query) -> Result<(), GuardError> {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                Self::check_query(&cte.query)?;
            }
        }
        if !query.locks.is_empty() {
            return Err(GuardError::forbidden("FOR UPDATE"));
        }
        Self::check_body(&query.body)
    }

    fn check_body(body: &SetExpr) -> Result<(), GuardError> {
        match body {
            SetExpr::Select(select) if select.into.is_some() => {
                Err(GuardError::forbidden("SELECT INTO"))
            }
            SetExpr::Select(_) | SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
            SetExpr::Query(query) => Self::check_query(query),
            SetExpr::SetOperation { left, right, .. } => {
                Self::check_body(left)?;
                Self::check_body(right)
            }
            SetExpr::Insert(_) => Err(GuardError::forbidden("INSERT")),
            SetExpr::Update(_) => Err(GuardError::forbidden("UPDATE")),
            SetExpr::Delete(_) => Err(GuardError::forbidden("DELETE")),
            SetExpr::Merge(_) => Err(GuardError::forbidden("MERGE")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_select_only() {
        // Valid SELECT
        assert!(SqlValidator::validate_select_only("SELECT * FROM users").is_ok());

        // Invalid INSERT
        assert!(SqlValidator::validate_select_only("INSERT INTO users VALUES (1)").is_err());

        // Invalid UPDATE
        assert!(SqlValidator::validate_select_only("UPDATE users SET username = 'test'").is_err());

        // Invalid DELETE
        assert!(SqlValidator::validate_select_only("DELETE FROM users").is_err());
    }

    #[test]
    fn test_aggregate_query_is_allowed() {
        let sql = "SELECT i.name, COUNT(*) FROM instructors i \
                   JOIN course_instructors ci ON ci.instructor_id = i.instructor_id \
                   GROUP BY i.name HAVING COUNT(*) > 2;";
        assert!(SqlValidator::validate_select_only(sql).is_ok());
    }

    #[test]
    fn test_smuggled_write_is_rejected() {
        let err = SqlValidator::validate_select_only("SELECT 1; DROP TABLE users").unwrap_err();
        assert!(matches!(err, GuardError::Forbidden(ref kind) if kind == "DROP"));
    }

    #[test]
    fn test_data_modifying_cte_is_rejected() {
        let sql = "WITH d AS (DELETE FROM users RETURNING *) SELECT * FROM d";
        let err = SqlValidator::validate_select_only(sql).unwrap_err();
        assert!(matches!(err, GuardError::Forbidden(ref kind) if kind == "DELETE"));

        let sql = "WITH n AS (INSERT INTO users (username) VALUES ('x') RETURNING user_id) \
                   SELECT user_id FROM n UNION SELECT user_id FROM users";
        let err = SqlValidator::validate_select_only(sql).unwrap_err();
        assert!(matches!(err, GuardError::Forbidden(ref kind) if kind == "INSERT"));
    }

    #[test]
    fn test_select_into_is_rejected() {
        let err = SqlValidator::validate_select_only("SELECT * INTO users_copy FROM users").unwrap_err();
        assert!(matches!(err, GuardError::Forbidden(ref kind) if kind == "SELECT INTO"));
    }

    #[test]
    fn test_read_only_cte_and_set_operation_are_allowed() {
        let sql = "WITH top AS (SELECT course_id FROM courses ORDER BY price DESC LIMIT 3) \
                   SELECT c.title FROM courses c JOIN top USING (course_id) \
                   UNION ALL (SELECT title FROM courses WHERE price = 0)";
        assert!(SqlValidator::validate_select_only(sql).is_ok());
    }

    #[test]
    fn test_unparseable_text_is_rejected() {
        let err = SqlValidator::validate_select_only("Here is your query: SELEKT").unwrap_err();
        assert!(matches!(err, GuardError::Parse(_)));
    }

    #[test]
    fn test_empty_text_is_rejected() {
        assert!(matches!(
            SqlValidator::validate_select_only("   "),
            Err(GuardError::Empty)
        ));
    }
}
