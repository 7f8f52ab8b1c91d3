use crate::config::TransducerConfig;
use crate::record::Record;

/// Предикаты над сырыми байтами строки: подавление, захват значения,
/// переписывание path.
///
/// Сравнение: байтовый префикс, не по сегментам: `gatling.mysim.users.x`
/// и `gatling.mysim.users.xyz` для префикса `gatling.mysim.users.x`
/// подавляются одинаково.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    filter_prefix: Vec<u8>,
    capture_path: Vec<u8>,
    rewrite: Option<PathRewrite>,
}

#[derive(Debug, Clone)]
struct PathRewrite {
    index: usize,
    label_prefix: Vec<u8>,
}

impl FilterPolicy {
    pub fn new(filter_prefix: &[u8], capture_path: &[u8]) -> Self {
        Self {
            filter_prefix: filter_prefix.to_vec(),
            capture_path: capture_path.to_vec(),
            rewrite: None,
        }
    }

    /// Включить вставку сегмента `<label_prefix><value>` в path по индексу `index`.
    pub fn with_path_rewrite(mut self, index: usize, label_prefix: &[u8]) -> Self {
        self.rewrite = Some(PathRewrite { index, label_prefix: label_prefix.to_vec() });
        self
    }

    pub fn from_config(cfg: &TransducerConfig) -> Self {
        let policy = Self::new(cfg.filter_prefix.as_bytes(), cfg.capture_path.as_bytes());
        if cfg.rewrite_path_segments {
            policy.with_path_rewrite(cfg.rewrite_segment_index, cfg.rewrite_label_prefix.as_bytes())
        } else {
            policy
        }
    }

    pub fn is_suppressed(&self, line: &[u8]) -> bool {
        line.starts_with(&self.filter_prefix)
    }

    /// Значение для aggregate, если строка относится к capture path.
    ///
    /// Берётся второе поле остатка после снятия filter prefix.
    pub fn captured_value<'a>(&self, line: &'a [u8]) -> Option<&'a [u8]> {
        if !line.starts_with(&self.capture_path) {
            return None;
        }
        line.strip_prefix(self.filter_prefix.as_slice())?
            .split(|&b| b == b' ')
            .nth(1)
    }

    /// Вставить сегмент с последним захваченным значением.
    ///
    /// Path из одного сегмента не трогается. Возвращает `true`, если path изменён.
    pub fn rewrite_path(&self, record: &mut Record, captured: &[u8]) -> bool {
        let Some(rewrite) = &self.rewrite else {
            return false;
        };
        if record.path.len() <= 1 {
            return false;
        }
        let mut segment = Vec::with_capacity(rewrite.label_prefix.len() + captured.len());
        segment.extend_from_slice(&rewrite.label_prefix);
        segment.extend_from_slice(captured);
        let at = rewrite.index.min(record.path.len());
        record.path.insert(at, segment);
        true
    }
}
