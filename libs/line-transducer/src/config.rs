use serde::Deserialize;

use crate::error::TransducerError;

/// Неизменяемая конфигурация transducer'а, задаётся при создании.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransducerConfig {
    /// Байтовый префикс строк, которые не пересылаются.
    pub filter_prefix: String,

    /// Префикс строки, чьё значение питает aggregate. Должен начинаться с `filter_prefix`.
    pub capture_path: String,

    /// Path синтетической aggregate-записи.
    pub aggregate_path: String,

    /// Вставлять aggregate-запись при смене timestamp.
    pub emit_aggregate: bool,

    /// Вставлять в path каждой пересылаемой записи сегмент
    /// `<rewrite_label_prefix><последнее значение>`.
    pub rewrite_path_segments: bool,

    /// Позиция вставляемого сегмента (ограничивается длиной path).
    pub rewrite_segment_index: usize,

    pub rewrite_label_prefix: String,

    /// Максимальная длина строки в байтах (0 = без ограничения).
    pub max_line_length: usize,
}

impl Default for TransducerConfig {
    fn default() -> Self {
        Self {
            filter_prefix: "gatling.mysim.users.".to_string(),
            capture_path: "gatling.mysim.users.allUsers.active".to_string(),
            aggregate_path: "gatling.mysim.allActiveUsers".to_string(),
            emit_aggregate: true,
            rewrite_path_segments: false,
            rewrite_segment_index: 3,
            rewrite_label_prefix: "users_".to_string(),
            max_line_length: 0,
        }
    }
}

impl TransducerConfig {
    pub fn validate(&self) -> Result<(), TransducerError> {
        if self.filter_prefix.is_empty() {
            return Err(TransducerError::Config("filter_prefix must not be empty".into()));
        }
        if self.aggregate_path.is_empty() {
            return Err(TransducerError::Config("aggregate_path must not be empty".into()));
        }
        if !self.capture_path.starts_with(&self.filter_prefix) {
            return Err(TransducerError::Config(format!(
                "capture_path {:?} must start with filter_prefix {:?}",
                self.capture_path, self.filter_prefix
            )));
        }
        if self.aggregate_path.starts_with(&self.filter_prefix) {
            return Err(TransducerError::Config(format!(
                "aggregate_path {:?} must not start with filter_prefix {:?}",
                self.aggregate_path, self.filter_prefix
            )));
        }
        if [&self.filter_prefix, &self.capture_path, &self.aggregate_path]
            .iter()
            .any(|s| s.contains('\n'))
        {
            return Err(TransducerError::Config("paths must not contain newlines".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TransducerConfig::default().validate().unwrap();
    }

    #[test]
    fn capture_outside_filter_is_rejected() {
        let cfg = TransducerConfig {
            capture_path: "other.allUsers.active".into(),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(TransducerError::Config(_))));
    }

    #[test]
    fn aggregate_under_filter_is_rejected() {
        let cfg = TransducerConfig {
            aggregate_path: "gatling.mysim.users.total".into(),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: TransducerConfig = toml::from_str(
            r#"
            filter_prefix = "app.sessions."
            capture_path = "app.sessions.open"
            rewrite_path_segments = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.filter_prefix, "app.sessions.");
        assert_eq!(cfg.aggregate_path, "gatling.mysim.allActiveUsers");
        assert!(cfg.rewrite_path_segments);
        assert!(cfg.emit_aggregate);
        cfg.validate().unwrap();
    }
}
