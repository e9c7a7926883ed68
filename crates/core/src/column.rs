use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Categorical,
    Date,
    Identifier,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }
}

impl std::fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnKind::Integer => write!(f, "integer"),
            ColumnKind::Float => write!(f, "float"),
            ColumnKind::Categorical => write!(f, "categorical"),
            ColumnKind::Date => write!(f, "date"),
            ColumnKind::Identifier => write!(f, "identifier"),
        }
    }
}

/// Externally inferred column type. Immutable input to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnType {
    pub kind: ColumnKind,
    /// Known category labels, in declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
    /// Inference confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl ColumnType {
    pub fn new(kind: ColumnKind) -> Self {
        Self {
            kind,
            categories: None,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    /// Confidence, treating an absent value as certain.
    pub fn confidence_or_default(&self) -> f64 {
        self.confidence.unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_lowercase() {
        let json = serde_json::to_string(&ColumnKind::Identifier).unwrap();
        assert_eq!(json, "\"identifier\"");
        let back: ColumnType = serde_json::from_str(r#"{"kind":"float"}"#).unwrap();
        assert_eq!(back.kind, ColumnKind::Float);
        assert_eq!(back.confidence_or_default(), 1.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let t = ColumnType::new(ColumnKind::Integer).with_confidence(1.7);
        assert_eq!(t.confidence, Some(1.0));
        assert!(t.kind.is_numeric());
        assert!(!ColumnKind::Date.is_numeric());
    }
}
