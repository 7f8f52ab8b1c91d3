use crate::record::Record;

/// Минимальная длина timestamp, при которой aggregate вообще рассматривается.
const MIN_TIMESTAMP_LEN: usize = 3;

/// Состояние aggregate: последнее захваченное значение и timestamp,
/// для которого синтетическая запись уже была выпущена.
#[derive(Debug, Clone)]
pub struct AggregateEmitter {
    path: Vec<u8>,
    last_captured: Vec<u8>,
    last_emitted: Option<Vec<u8>>,
}

impl AggregateEmitter {
    pub fn new(aggregate_path: &[u8]) -> Self {
        Self {
            path: aggregate_path.to_vec(),
            last_captured: Vec::new(),
            last_emitted: None,
        }
    }

    /// Last writer wins, переупорядочивание не исправляется.
    pub fn observe_capture(&mut self, value: &[u8]) {
        self.last_captured.clear();
        self.last_captured.extend_from_slice(value);
    }

    pub fn last_captured(&self) -> &[u8] {
        &self.last_captured
    }

    pub fn last_emitted(&self) -> Option<&[u8]> {
        self.last_emitted.as_deref()
    }

    /// Синтетическая запись, если `timestamp` отличается от последнего выпущенного.
    ///
    /// Если захвата ещё не было, запись выпускается с пустым value.
    pub fn maybe_emit(&mut self, timestamp: &[u8]) -> Option<Record> {
        let record = self.pending(timestamp)?;
        self.mark_emitted(timestamp);
        Some(record)
    }

    /// То же, что `maybe_emit`, но без изменения состояния.
    pub fn pending(&self, timestamp: &[u8]) -> Option<Record> {
        if timestamp.len() < MIN_TIMESTAMP_LEN || self.last_emitted.as_deref() == Some(timestamp) {
            return None;
        }
        Some(Record::new(&self.path, &self.last_captured, timestamp))
    }

    pub fn mark_emitted(&mut self, timestamp: &[u8]) {
        match &mut self.last_emitted {
            Some(last) => {
                last.clear();
                last.extend_from_slice(timestamp);
            }
            None => self.last_emitted = Some(timestamp.to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_once_per_timestamp() {
        let mut agg = AggregateEmitter::new(b"gatling.mysim.allActiveUsers");
        agg.observe_capture(b"7");

        let rec = agg.maybe_emit(b"1000000002").unwrap();
        assert_eq!(rec.format(), b"gatling.mysim.allActiveUsers 7 1000000002");
        assert!(agg.maybe_emit(b"1000000002").is_none());

        agg.observe_capture(b"9");
        let rec = agg.maybe_emit(b"1000000003").unwrap();
        assert_eq!(rec.value, b"9");
        assert_eq!(agg.last_emitted(), Some(&b"1000000003"[..]));
    }

    #[test]
    fn short_timestamps_are_ignored() {
        let mut agg = AggregateEmitter::new(b"agg");
        assert!(agg.maybe_emit(b"").is_none());
        assert!(agg.maybe_emit(b"12").is_none());
        assert!(agg.last_emitted().is_none());
        assert!(agg.maybe_emit(b"123").is_some());
    }

    #[test]
    fn emits_empty_value_before_first_capture() {
        let mut agg = AggregateEmitter::new(b"agg");
        let rec = agg.maybe_emit(b"1000000001").unwrap();
        assert!(rec.value.is_empty());
        assert_eq!(rec.format(), b"agg  1000000001");
    }

    #[test]
    fn pending_does_not_mutate() {
        let mut agg = AggregateEmitter::new(b"agg");
        assert!(agg.pending(b"1000000001").is_some());
        assert!(agg.pending(b"1000000001").is_some());
        agg.mark_emitted(b"1000000001");
        assert!(agg.pending(b"1000000001").is_none());
    }

    #[test]
    fn capture_overwrites_previous_value() {
        let mut agg = AggregateEmitter::new(b"agg");
        agg.observe_capture(b"100");
        agg.observe_capture(b"5");
        assert_eq!(agg.last_captured(), b"5");
    }
}
