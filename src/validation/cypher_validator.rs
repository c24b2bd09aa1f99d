use super::GuardError;

/// Clauses that can modify a graph
const WRITE_CLAUSES: [&str; 7] = ["CREATE", "MERGE", "DELETE", "DETACH", "SET", "REMOVE", "DROP"];

/// Read-only check for generated Cypher.
///
/// Works on tokens outside string literals, identifiers in backticks and
/// comments, so a property value such as `'SET piece'` does not trip it.
pub struct CypherValidator;

impl CypherValidator {
    pub fn validate_read_only(cypher: &str) -> Result<(), GuardError> {
        let tokens = Self::keywords(cypher);
        if tokens.is_empty() {
            return Err(GuardError::Empty);
        }

        for (idx, token) in tokens.iter().enumerate() {
            if WRITE_CLAUSES.contains(&token.as_str()) {
                return Err(GuardError::forbidden(token.clone()));
            }
            let next = tokens.get(idx + 1).map(String::as_str);
            match (token.as_str(), next) {
                ("LOAD", Some("CSV")) => return Err(GuardError::forbidden("LOAD CSV")),
                ("FOREACH", _) => return Err(GuardError::forbidden("FOREACH")),
                ("IN", Some("TRANSACTIONS")) => {
                    return Err(GuardError::forbidden("CALL IN TRANSACTIONS"))
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Uppercased bare words of the query, skipping quoted text, comments
    /// and property keys (a word right after `.`)
    fn keywords(cypher: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut after_dot = false;
        let mut property = false;
        let mut chars = cypher.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\'' | '"' | '`' => {
                    Self::flush(&mut current, &mut tokens, property);
                    property = false;
                    let mut escaped = false;
                    for inner in chars.by_ref() {
                        if escaped {
                            escaped = false;
                        } else if inner == '\\' {
                            escaped = true;
                        } else if inner == c {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'/') => {
                    Self::flush(&mut current, &mut tokens, property);
                    property = false;
                    for inner in chars.by_ref() {
                        if inner == '\n' {
                            break;
                        }
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    Self::flush(&mut current, &mut tokens, property);
                    property = false;
                    chars.next();
                    let mut prev = '\0';
                    for inner in chars.by_ref() {
                        if prev == '*' && inner == '/' {
                            break;
                        }
                        prev = inner;
                    }
                }
                c if c.is_alphanumeric() || c == '_' => {
                    if current.is_empty() {
                        property = after_dot;
                    }
                    current.push(c);
                }
                _ => {
                    Self::flush(&mut current, &mut tokens, property);
                    property = false;
                    after_dot = c == '.';
                    continue;
                }
            }
            after_dot = false;
        }
        Self::flush(&mut current, &mut tokens, property);
        tokens
    }

    fn flush(current: &mut String, tokens: &mut Vec<String>, property: bool) {
        if !current.is_empty() && !property {
            tokens.push(current.to_uppercase());
        }
        current.clear();
    }
}
