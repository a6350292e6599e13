use thiserror::Error;

/// The one user-facing input error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("missing expected columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

impl SchemaError {
    pub fn missing(&self) -> &[String] {
        match self {
            SchemaError::MissingColumns(names) => names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lists_every_missing_name() {
        let err = SchemaError::MissingColumns(vec!["Stage".into(), "Date modified".into()]);
        assert_eq!(
            err.to_string(),
            "missing expected columns: Stage, Date modified"
        );
        assert_eq!(err.missing().len(), 2);
    }
}
