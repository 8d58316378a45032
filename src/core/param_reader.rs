//! Typed accessors over a rule instance's opaque `params` object, replacing
//! reflection-based parameter binding with explicit, per-rule reads.

use serde_json::{Map, Value};

use crate::spi::traits::RuleFailure;

/// A borrowing view over one rule instance's `params` map.
pub struct ParamReader<'a> {
    rule_id: &'a str,
    params: &'a Map<String, Value>,
}

impl<'a> ParamReader<'a> {
    pub fn new(rule_id: &'a str, params: &'a Map<String, Value>) -> Self {
        ParamReader { rule_id, params }
    }

    fn missing(&self, key: &str) -> RuleFailure {
        RuleFailure::Param(format!("{}: missing required param '{key}'", self.rule_id))
    }

    fn wrong_type(&self, key: &str, expected: &str) -> RuleFailure {
        RuleFailure::Param(format!("{}: param '{key}' must be {expected}", self.rule_id))
    }

    /// A required string param.
    pub fn get_str(&self, key: &str) -> Result<&'a str, RuleFailure> {
        match self.params.get(key) {
            Some(Value::String(s)) => Ok(s.as_str()),
            Some(_) => Err(self.wrong_type(key, "a string")),
            None => Err(self.missing(key)),
        }
    }

    /// An optional string param.
    pub fn get_str_opt(&self, key: &str) -> Result<Option<&'a str>, RuleFailure> {
        match self.params.get(key) {
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(self.wrong_type(key, "a string")),
        }
    }

    /// A required integer param.
    pub fn get_i64(&self, key: &str) -> Result<i64, RuleFailure> {
        match self.params.get(key) {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| self.wrong_type(key, "an integer")),
            Some(_) => Err(self.wrong_type(key, "an integer")),
            None => Err(self.missing(key)),
        }
    }

    /// An optional integer param with a default.
    pub fn get_i64_or(&self, key: &str, default: i64) -> Result<i64, RuleFailure> {
        match self.params.get(key) {
            Some(Value::Null) | None => Ok(default),
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| self.wrong_type(key, "an integer")),
            Some(_) => Err(self.wrong_type(key, "an integer")),
        }
    }

    /// A required boolean param, defaulting to `default` when absent.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, RuleFailure> {
        match self.params.get(key) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::Null) | None => Ok(default),
            Some(_) => Err(self.wrong_type(key, "a boolean")),
        }
    }

    /// A required list-of-strings param; absent yields an empty vec.
    pub fn get_str_list(&self, key: &str) -> Result<Vec<&'a str>, RuleFailure> {
        match self.params.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().ok_or_else(|| self.wrong_type(key, "a list of strings")))
                .collect(),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(self.wrong_type(key, "a list of strings")),
        }
    }

    /// A required string param restricted to one of `allowed`.
    pub fn get_enum(&self, key: &str, allowed: &[&str]) -> Result<&'a str, RuleFailure> {
        let value = self.get_str(key)?;
        if allowed.contains(&value) {
            Ok(value)
        } else {
            Err(RuleFailure::Param(format!(
                "{}: param '{key}' must be one of {allowed:?}, got '{value}'",
                self.rule_id
            )))
        }
    }

    /// Keys present in `params` that none of `known` name; rules report
    /// these as warnings rather than failing outright.
    pub fn unknown_keys(&self, known: &[&str]) -> Vec<String> {
        self.params.keys().filter(|k| !known.contains(&k.as_str())).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_typed_params() {
        let params = json!({"maxDepth": 3, "strict": true, "roles": ["a", "b"]});
        let map = params.as_object().unwrap();
        let reader = ParamReader::new("test.rule", map);
        assert_eq!(reader.get_i64("maxDepth").unwrap(), 3);
        assert!(reader.get_bool("strict", false).unwrap());
        assert_eq!(reader.get_str_list("roles").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn missing_required_param_fails() {
        let params = json!({});
        let map = params.as_object().unwrap();
        let reader = ParamReader::new("test.rule", map);
        assert!(matches!(reader.get_str("name"), Err(RuleFailure::Param(_))));
    }

    #[test]
    fn enum_rejects_unknown_value() {
        let params = json!({"mode": "bogus"});
        let map = params.as_object().unwrap();
        let reader = ParamReader::new("test.rule", map);
        assert!(reader.get_enum("mode", &["direct", "transitive"]).is_err());
    }
}
