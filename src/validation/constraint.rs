use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::{Validator, Violation, Violations};

/// Runs the target's own `#[derive(Validate)]` constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintValidator;

impl<T: Validate> Validator<T> for ConstraintValidator {
    fn validate(&self, target: &T) -> Result<(), Violations> {
        match target.validate() {
            Ok(()) => Ok(()),
            Err(errors) => {
                let mut violations = Vec::new();
                flatten("", &errors, &mut violations);
                violations.sort_by(|a, b| a.field.cmp(&b.field));
                Err(violations.into_iter().collect())
            }
        }
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, out: &mut Vec<Violation>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errors) => {
                for error in errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| error.code.to_string());
                    let mut violation = Violation::new(path.clone(), message);
                    if let Some(value) = error.params.get("value") {
                        let rejected = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
                        violation = violation.with_rejected(rejected);
                    }
                    out.push(violation);
                }
            }
            ValidationErrorsKind::Struct(nested) => flatten(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Pool {
        #[validate(range(min = 1, max = 64))]
        size: u32,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Database {
        #[validate(length(min = 1, message = "url must not be empty"))]
        url: String,
        #[validate(nested)]
        pool: Pool,
    }

    #[test]
    fn test_valid_target_passes() {
        let db = Database {
            url: "postgres://localhost".into(),
            pool: Pool { size: 8 },
        };
        assert!(Validator::<Database>::validate(&ConstraintValidator, &db).is_ok());
    }

    #[test]
    fn test_nested_violations_are_flattened() {
        let db = Database {
            url: String::new(),
            pool: Pool { size: 0 },
        };
        let violations = Validator::<Database>::validate(&ConstraintValidator, &db).unwrap_err();
        let found: Vec<_> = violations
            .iter()
            .map(|v| (v.field.as_str(), v.message.as_str()))
            .collect();
        assert_eq!(found, vec![("pool.size", "range"), ("url", "url must not be empty")]);
        let size = violations.iter().next().unwrap();
        assert_eq!(size.rejected.as_deref(), Some("0"));
    }
}
